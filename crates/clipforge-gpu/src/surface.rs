//! Window surface configuration and frame acquisition.

use crate::context::DeviceContext;
use clipforge_core::{ClipforgeError, PreviewConfig, Result};
use tracing::{debug, info, warn};

/// Presentation settings, taken from the preview config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub vsync: bool,
    pub max_frame_latency: u32,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            vsync: true,
            max_frame_latency: 2,
        }
    }
}

impl From<&PreviewConfig> for SurfaceOptions {
    fn from(config: &PreviewConfig) -> Self {
        Self {
            vsync: config.vsync,
            max_frame_latency: config.max_frame_latency.max(1),
        }
    }
}

/// Pick the surface format to render into.
///
/// Linear 8-bit formats are preferred so the filtered values reach the
/// display without an extra sRGB encode. Otherwise the platform's first
/// advertised format is used.
pub fn negotiate_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    const PREFERRED: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8Unorm,
        wgpu::TextureFormat::Rgba8Unorm,
    ];
    PREFERRED
        .into_iter()
        .find(|format| formats.contains(format))
        .or_else(|| formats.first().copied())
}

/// A configured window surface.
pub struct PresentationSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    /// Format the render pass writes through; differs from the surface
    /// format only when an sRGB surface is viewed as linear.
    view_format: wgpu::TextureFormat,
}

impl PresentationSurface {
    /// Configure `surface` for the device in `ctx`.
    pub fn configure(
        ctx: &DeviceContext,
        surface: wgpu::Surface<'static>,
        (width, height): (u32, u32),
        options: &SurfaceOptions,
    ) -> Result<Self> {
        let caps = surface.get_capabilities(&ctx.adapter);
        let format = negotiate_format(&caps.formats).ok_or_else(|| {
            ClipforgeError::Surface("Surface reports no supported formats".to_string())
        })?;

        let linear = format.remove_srgb_suffix();
        let can_reinterpret = ctx
            .adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::SURFACE_VIEW_FORMATS);
        let (view_format, view_formats) = if linear != format && can_reinterpret {
            (linear, vec![linear])
        } else {
            (format, vec![])
        };

        let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
            wgpu::CompositeAlphaMode::Opaque
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let present_mode = if options.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode,
            view_formats,
            desired_maximum_frame_latency: options.max_frame_latency,
        };
        surface.configure(&ctx.device, &config);

        info!(
            ?format,
            ?view_format,
            ?present_mode,
            "Surface configured at {}x{}",
            config.width,
            config.height
        );

        Ok(Self {
            surface,
            config,
            view_format,
        })
    }

    /// Format pipelines targeting this surface must use.
    pub fn view_format(&self) -> wgpu::TextureFormat {
        self.view_format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure after the window was resized. Zero sizes are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
        debug!("Surface resized to {}x{}", width, height);
    }

    /// Acquire the next surface texture and a view in [`view_format`](Self::view_format).
    ///
    /// Returns `None` when this frame should be skipped: the surface was
    /// outdated or lost (it is reconfigured here) or acquisition timed out.
    pub fn acquire(
        &self,
        device: &wgpu::Device,
    ) -> Result<Option<(wgpu::SurfaceTexture, wgpu::TextureView)>> {
        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                debug!("Surface outdated, reconfiguring");
                self.surface.configure(device, &self.config);
                return Ok(None);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Timed out acquiring surface texture");
                return Ok(None);
            }
            Err(e) => {
                return Err(ClipforgeError::Surface(format!(
                    "Failed to acquire surface texture: {e}"
                )))
            }
        };

        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.view_format),
            ..Default::default()
        });
        Ok(Some((texture, view)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefers_linear_bgra() {
        let formats = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureFormat::Bgra8Unorm,
        ];
        assert_eq!(
            negotiate_format(&formats),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
    }

    #[test]
    fn test_falls_back_to_first_format() {
        let formats = [
            wgpu::TextureFormat::Rgb10a2Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            negotiate_format(&formats),
            Some(wgpu::TextureFormat::Rgb10a2Unorm)
        );
        assert_eq!(negotiate_format(&[]), None);
    }

    #[test]
    fn test_options_from_config() {
        let config = PreviewConfig {
            vsync: false,
            max_frame_latency: 0,
            ..Default::default()
        };
        let options = SurfaceOptions::from(&config);
        assert!(!options.vsync);
        assert_eq!(options.max_frame_latency, 1);
    }
}
