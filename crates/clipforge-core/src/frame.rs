//! RGBA frame buffers in CPU memory.

use crate::error::{ClipforgeError, Result};

/// An 8-bit RGBA video frame.
///
/// Rows are padded to a 64-byte stride so they can be handed to the GPU
/// queue as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Raw pixel data, `stride * height` bytes
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Create a zeroed frame buffer with the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        // Align stride to 64 bytes for SIMD and GPU compatibility
        let min_stride = width as usize * Self::BYTES_PER_PIXEL;
        let stride = (min_stride + 63) & !63;
        Self {
            width,
            height,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    /// Wrap tightly packed RGBA bytes, as produced by a raw-video decoder.
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let stride = width as usize * Self::BYTES_PER_PIXEL;
        if data.len() != stride * height as usize {
            return Err(ClipforgeError::InvalidParameter(format!(
                "{} bytes do not form a {}x{} RGBA frame",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Get a row of pixel data (without padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * Self::BYTES_PER_PIXEL]
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * Self::BYTES_PER_PIXEL;
        &mut self.data[start..end]
    }

    /// RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = x as usize * Self::BYTES_PER_PIXEL;
        let row = self.row(y);
        [row[i], row[i + 1], row[i + 2], row[i + 3]]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Create a gradient test pattern: red ramps left to right, green top to
    /// bottom, blue fixed at half intensity.
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let mut frame = Self::new(width, height);
        for y in 0..height {
            let green = (y as f32 / height as f32 * 255.0) as u8;
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = x as usize * Self::BYTES_PER_PIXEL;
                let red = (x as f32 / width as f32 * 255.0) as u8;
                row[i..i + 4].copy_from_slice(&[red, green, 128, 255]);
            }
        }
        frame
    }
}
