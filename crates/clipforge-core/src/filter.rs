//! Preview filter parameters.
//!
//! The compositing shader applies, in this fixed order:
//! 1. brightness: additive offset on all three channels
//! 2. contrast: scale about the 0.5 midpoint, `(c - 0.5) * k + 0.5`
//! 3. grayscale: blend toward BT.601 luma
//!
//! Each stage saturates to `[0, 1]` before the next one runs, which is what
//! makes the stage order observable. [`FilterParams::apply`] is the CPU
//! reference for the fragment stage and must stay in lockstep with
//! `composite.wgsl`.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// ITU-R BT.601 luma weights.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);

/// Brightness / contrast / grayscale adjustment applied to every preview frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    /// Additive offset, `0.0` = unchanged.
    pub brightness: f32,
    /// Multiplicative scale about 0.5, `1.0` = unchanged.
    pub contrast: f32,
    /// Blend toward luma, `0.0` = original color, `1.0` = fully gray.
    pub grayscale: f32,
}

impl FilterParams {
    /// Parameters that reproduce the source frame unchanged.
    pub const IDENTITY: Self = Self {
        brightness: 0.0,
        contrast: 1.0,
        grayscale: 0.0,
    };

    pub const BRIGHTNESS_RANGE: RangeInclusive<f32> = -1.0..=1.0;
    pub const CONTRAST_RANGE: RangeInclusive<f32> = 0.0..=3.0;
    pub const GRAYSCALE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

    /// Clamp every field into its UI range.
    ///
    /// The compositor never validates parameters itself; callers feeding
    /// user input are expected to clamp first.
    pub fn clamped(self) -> Self {
        fn clamp(v: f32, range: &RangeInclusive<f32>) -> f32 {
            v.clamp(*range.start(), *range.end())
        }
        Self {
            brightness: clamp(self.brightness, &Self::BRIGHTNESS_RANGE),
            contrast: clamp(self.contrast, &Self::CONTRAST_RANGE),
            grayscale: clamp(self.grayscale, &Self::GRAYSCALE_RANGE),
        }
    }

    /// Apply the filter chain to a normalized RGB color.
    pub fn apply(&self, rgb: Vec3) -> Vec3 {
        let mut color = (rgb + Vec3::splat(self.brightness)).clamp(Vec3::ZERO, Vec3::ONE);
        color = ((color - Vec3::splat(0.5)) * self.contrast + Vec3::splat(0.5))
            .clamp(Vec3::ZERO, Vec3::ONE);
        let luma = color.dot(LUMA_WEIGHTS);
        color * (1.0 - self.grayscale) + Vec3::splat(luma * self.grayscale)
    }

    /// Apply the filter chain to an 8-bit RGBA pixel. Alpha is forced opaque.
    pub fn apply_rgba8(&self, pixel: [u8; 4]) -> [u8; 4] {
        let rgb = Vec3::new(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32) / 255.0;
        let out = (self.apply(rgb).clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
        [out.x as u8, out.y as u8, out.z as u8, 255]
    }

    /// GPU uniform layout of these parameters.
    pub fn to_uniform(&self) -> FilterUniform {
        FilterUniform {
            brightness: self.brightness,
            contrast: self.contrast,
            grayscale: self.grayscale,
            _pad: 0.0,
        }
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `FilterParams` as laid out in the shader's uniform block (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FilterUniform {
    pub brightness: f32,
    pub contrast: f32,
    pub grayscale: f32,
    pub _pad: f32,
}

#[derive(Debug)]
struct FilterState {
    params: FilterParams,
    revision: u64,
}

/// Shared, last-writer-wins filter parameters.
///
/// The UI writes with [`set`](Self::set); the frame loop reads a snapshot
/// once per frame and re-uploads only when the revision moved.
#[derive(Debug, Clone)]
pub struct FilterControl {
    state: Arc<Mutex<FilterState>>,
}

impl FilterControl {
    pub fn new(params: FilterParams) -> Self {
        Self {
            state: Arc::new(Mutex::new(FilterState {
                params,
                revision: 0,
            })),
        }
    }

    /// Replace the current parameters.
    pub fn set(&self, params: FilterParams) {
        let mut state = self.state.lock();
        state.params = params;
        state.revision += 1;
    }

    /// Modify the current parameters in place.
    pub fn update(&self, f: impl FnOnce(&mut FilterParams)) {
        let mut state = self.state.lock();
        f(&mut state.params);
        state.revision += 1;
    }

    /// Current parameters and their revision.
    pub fn snapshot(&self) -> (FilterParams, u64) {
        let state = self.state.lock();
        (state.params, state.revision)
    }

    pub fn params(&self) -> FilterParams {
        self.state.lock().params
    }
}

impl Default for FilterControl {
    fn default() -> Self {
        Self::new(FilterParams::IDENTITY)
    }
}
