//! Video texture management.

use crate::pipeline::CompositePipeline;
use clipforge_core::{ClipforgeError, FrameBuffer, FrameHandle, Result};
use tracing::debug;

/// A GPU texture sized to the video's native resolution.
pub struct VideoTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl VideoTexture {
    /// Decoded frames are 8-bit RGBA; the shader works on the raw values.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Video Frame Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Copy `frame` into the texture. Sizes must match exactly.
    pub fn upload(&self, queue: &wgpu::Queue, frame: &FrameBuffer) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(ClipforgeError::Gpu(format!(
                "Frame size {}x{} doesn't match texture size {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride as u32),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }
}

struct StreamSlot {
    texture: VideoTexture,
    bind_group: wgpu::BindGroup,
}

/// Owns the current video texture and the bind group that samples it.
///
/// The texture and its bind group are always replaced together, so a draw
/// can never sample a texture of one size through a bind group built for
/// another.
#[derive(Default)]
pub struct TextureStreamer {
    slot: Option<StreamSlot>,
    generation: u64,
}

impl TextureStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the current texture, if one exists.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.slot
            .as_ref()
            .map(|slot| (slot.texture.width, slot.texture.height))
    }

    /// Replace the texture with one of `width` x `height`.
    ///
    /// The previous texture is released once the new slot is in place.
    pub fn recreate(
        &mut self,
        device: &wgpu::Device,
        pipeline: &CompositePipeline,
        uniforms: &wgpu::Buffer,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ClipforgeError::InvalidParameter(format!(
                "Cannot create a {}x{} video texture",
                width, height
            )));
        }

        let texture = VideoTexture::new(device, width, height);
        let bind_group = pipeline.create_bind_group(device, &texture.view, uniforms);
        if let Some(old) = self.slot.replace(StreamSlot {
            texture,
            bind_group,
        }) {
            debug!(
                "Video texture {}x{} -> {}x{}",
                old.texture.width, old.texture.height, width, height
            );
        }
        self.generation += 1;
        Ok(())
    }

    /// Copy the borrowed frame into the current texture.
    pub fn upload_frame(&self, queue: &wgpu::Queue, frame: &FrameHandle<'_>) -> Result<()> {
        let slot = self
            .slot
            .as_ref()
            .ok_or_else(|| ClipforgeError::Gpu("No video texture allocated".to_string()))?;
        slot.texture.upload(queue, frame.frame())
    }

    /// Bind group for the current texture.
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.slot.as_ref().map(|slot| &slot.bind_group)
    }

    /// Bumped on every successful [`recreate`](Self::recreate).
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
