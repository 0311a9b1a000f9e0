//! Live preview window.
//!
//! One window, one GPU session. Frames are driven by `RedrawRequested`; the
//! next redraw is only requested while the scheduler wants another tick.

use anyhow::{anyhow, Result};
use clipforge_core::{
    AppConfig, FilterControl, FilterParams, PatternSource, PreviewConfig, VideoSource,
};
use clipforge_gpu::{FrameScheduler, GpuSession, GpuView, SchedulerState, WgpuHost};
use clipforge_media::FfmpegVideoSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

const BRIGHTNESS_STEP: f32 = 0.05;
const CONTRAST_STEP: f32 = 0.1;

/// Open the preview window and run until it is closed.
pub fn run(video: Option<PathBuf>, config: &AppConfig) -> Result<()> {
    let source: Box<dyn VideoSource> = match video {
        Some(path) => Box::new(FfmpegVideoSource::open(&path)?),
        None => {
            info!("No video given, showing the test pattern");
            Box::new(PatternSource::new(
                config.preview.window_width,
                config.preview.window_height,
            ))
        }
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = PreviewApp::new(source, config.preview.clone());
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct PreviewApp {
    config: PreviewConfig,
    source: Box<dyn VideoSource>,
    host: WgpuHost,
    view: GpuView,
    filters: FilterControl,
    scheduler: FrameScheduler<GpuSession>,
    window: Option<Arc<Window>>,
    end_reported: bool,
    failure: Option<anyhow::Error>,
}

impl PreviewApp {
    fn new(source: Box<dyn VideoSource>, config: PreviewConfig) -> Self {
        let filters = FilterControl::new(config.filters.clamped());
        let view = GpuView::new();
        let scheduler = FrameScheduler::new(filters.clone(), view.liveness().clone());
        Self {
            config,
            source,
            host: WgpuHost::new(),
            view,
            filters,
            scheduler,
            window: None,
            end_reported: false,
            failure: None,
        }
    }

    /// Probe, configure the surface and hand a new session to the scheduler.
    fn build_session(&mut self, window: &Arc<Window>) -> Result<()> {
        let Some(context) = self.view.refresh_blocking(&self.host) else {
            return Err(anyhow!("{}", self.view.status()));
        };
        info!("{}", self.view.status());

        let surface = self.host.create_surface(window.clone())?;
        let size = window.inner_size();
        let session = GpuSession::new(context, surface, (size.width, size.height), &self.config)?;
        self.scheduler.attach(session);
        window.request_redraw();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.failure = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.view.teardown();
        self.scheduler.stop();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        self.scheduler.tick(self.source.as_mut());

        if !self.end_reported && self.source.is_finished() {
            info!(
                "End of video after {} frames, holding the last one",
                self.scheduler.frames_presented()
            );
            self.end_reported = true;
        }

        if let SchedulerState::DeviceLost { reason } = self.scheduler.state() {
            warn!("Rebuilding GPU session after device loss: {}", reason);
            if let Some(window) = self.window.clone() {
                if let Err(e) = self.build_session(&window) {
                    self.fail(event_loop, e);
                    return;
                }
            }
        }

        if self.scheduler.should_schedule_next() {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }

        let change: Option<fn(&mut FilterParams)> = match &event.logical_key {
            Key::Named(NamedKey::Escape) => {
                self.shutdown(event_loop);
                return;
            }
            Key::Named(NamedKey::ArrowUp) => Some(|p| p.brightness += BRIGHTNESS_STEP),
            Key::Named(NamedKey::ArrowDown) => Some(|p| p.brightness -= BRIGHTNESS_STEP),
            Key::Named(NamedKey::ArrowRight) => Some(|p| p.contrast += CONTRAST_STEP),
            Key::Named(NamedKey::ArrowLeft) => Some(|p| p.contrast -= CONTRAST_STEP),
            Key::Character(c) if c.eq_ignore_ascii_case("g") => {
                Some(|p| p.grayscale = if p.grayscale > 0.0 { 0.0 } else { 1.0 })
            }
            Key::Character(c) if c.eq_ignore_ascii_case("r") => {
                Some(|p| *p = FilterParams::IDENTITY)
            }
            _ => None,
        };

        if let Some(change) = change {
            self.filters.update(|params| {
                change(params);
                *params = params.clamped();
            });
            info!("Filters: {:?}", self.filters.params());
        }
    }
}

impl ApplicationHandler for PreviewApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("ClipForge Preview")
            .with_inner_size(LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, e.into());
                return;
            }
        };
        self.window = Some(window.clone());

        if let Err(e) = self.build_session(&window) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.window.as_ref().map(|w| w.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                if let Some(session) = self.scheduler.backend_mut() {
                    session.resize(size.width, size.height);
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}
