//! The wgpu-backed preview renderer for one window.

use crate::context::DeviceContext;
use crate::pipeline::CompositePipeline;
use crate::scheduler::{FrameBackend, RenderStatus};
use crate::surface::{PresentationSurface, SurfaceOptions};
use crate::texture::TextureStreamer;
use clipforge_core::{FilterParams, FilterUniform, FrameHandle, PreviewConfig, Result};
use tracing::debug;

/// Everything needed to composite video into one window.
///
/// Fields are declared in release order: GPU resources first, the device
/// context last.
pub struct GpuSession {
    streamer: TextureStreamer,
    uniforms: wgpu::Buffer,
    pipeline: CompositePipeline,
    surface: PresentationSurface,
    clear_color: wgpu::Color,
    context: DeviceContext,
}

impl GpuSession {
    /// Configure `surface` and build the compositing pipeline on `context`.
    pub fn new(
        context: DeviceContext,
        surface: wgpu::Surface<'static>,
        size: (u32, u32),
        config: &PreviewConfig,
    ) -> Result<Self> {
        let surface =
            PresentationSurface::configure(&context, surface, size, &SurfaceOptions::from(config))?;
        let pipeline = CompositePipeline::new(&context.device, surface.view_format());

        let uniforms = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Filter Uniforms"),
            size: std::mem::size_of::<FilterUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        context.queue.write_buffer(
            &uniforms,
            0,
            bytemuck::bytes_of(&config.filters.clamped().to_uniform()),
        );

        let [r, g, b, a] = config.clear_color;
        Ok(Self {
            streamer: TextureStreamer::new(),
            uniforms,
            pipeline,
            surface,
            clear_color: wgpu::Color { r, g, b, a },
            context,
        })
    }

    /// Follow a window resize.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(&self.context.device, width, height);
    }
}

impl FrameBackend for GpuSession {
    fn texture_size(&self) -> Option<(u32, u32)> {
        self.streamer.size()
    }

    fn recreate_texture(&mut self, width: u32, height: u32) -> Result<()> {
        self.streamer.recreate(
            &self.context.device,
            &self.pipeline,
            &self.uniforms,
            width,
            height,
        )
    }

    fn upload_frame(&mut self, frame: &FrameHandle<'_>) -> Result<()> {
        self.streamer.upload_frame(&self.context.queue, frame)
    }

    fn write_params(&mut self, params: &FilterParams) {
        self.context
            .queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&params.to_uniform()));
    }

    fn render(&mut self) -> Result<RenderStatus> {
        let Some((frame, view)) = self.surface.acquire(&self.context.device)? else {
            return Ok(RenderStatus::Skipped);
        };

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Preview Encoder"),
                });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Preview Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Before the first frame arrives only the clear color is shown.
            if let Some(bind_group) = self.streamer.bind_group() {
                pass.set_pipeline(&self.pipeline.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..6, 0..1);
            }
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(RenderStatus::Presented)
    }

    fn lost_reason(&self) -> Option<String> {
        self.context.lost_reason()
    }
}

impl Drop for GpuSession {
    fn drop(&mut self) {
        debug!(
            "Releasing preview session (texture generation {})",
            self.streamer.generation()
        );
    }
}
