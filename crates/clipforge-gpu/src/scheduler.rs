//! Preview frame loop.
//!
//! [`FrameScheduler`] drives one frame per display refresh: it pulls the
//! source's current frame into the video texture, pushes changed filter
//! parameters, and presents. The host calls [`FrameScheduler::tick`] from its
//! redraw callback and only asks for another redraw while
//! [`FrameScheduler::should_schedule_next`] holds, so nothing is left
//! scheduled after the view is torn down.

use clipforge_core::{
    CancelToken, ClipforgeError, FilterControl, FilterParams, FrameHandle, Result, VideoSource,
};
use tracing::{debug, error, info, warn};

/// Lifecycle of the preview loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for a device and a ready source.
    Idle,
    /// Source is ready; playback starts and the texture is sized on the next tick.
    Initializing,
    Running,
    /// Torn down. Terminal.
    Stopped,
    /// The device was lost. A new backend can be attached to restart.
    DeviceLost { reason: String },
}

/// Whether the host should keep scheduling ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Halt,
}

/// What a render attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Presented,
    /// No surface texture this frame (outdated surface, timeout).
    Skipped,
}

/// GPU operations the frame loop needs.
///
/// [`GpuSession`](crate::GpuSession) implements this over wgpu; tests use
/// recording fakes.
pub trait FrameBackend {
    /// Size of the current video texture.
    fn texture_size(&self) -> Option<(u32, u32)>;

    /// Replace the video texture and its bind group.
    fn recreate_texture(&mut self, width: u32, height: u32) -> Result<()>;

    /// Copy the borrowed frame into the video texture.
    fn upload_frame(&mut self, frame: &FrameHandle<'_>) -> Result<()>;

    /// Write the filter uniforms.
    fn write_params(&mut self, params: &FilterParams);

    /// Encode, submit and present one frame.
    fn render(&mut self) -> Result<RenderStatus>;

    /// Reason the device was lost, if it was.
    fn lost_reason(&self) -> Option<String>;
}

/// Per-view frame loop state machine.
pub struct FrameScheduler<B> {
    state: SchedulerState,
    backend: Option<B>,
    filters: FilterControl,
    uploaded_revision: Option<u64>,
    cancel: CancelToken,
    frames_presented: u64,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn new(filters: FilterControl, cancel: CancelToken) -> Self {
        Self {
            state: SchedulerState::Idle,
            backend: None,
            filters,
            uploaded_revision: None,
            cancel,
            frames_presented: 0,
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    /// Hand the scheduler a freshly probed backend.
    ///
    /// After a device loss this re-enters `Initializing`, so the texture is
    /// rebuilt and playback resumes on the next tick. A stopped scheduler
    /// refuses the backend and drops it.
    pub fn attach(&mut self, backend: B) {
        match self.state {
            SchedulerState::Stopped => {
                warn!("Backend attached after teardown, releasing it");
                return;
            }
            SchedulerState::DeviceLost { .. } => {
                info!("New device attached, restarting preview");
                self.state = SchedulerState::Initializing;
            }
            _ => {}
        }
        self.uploaded_revision = None;
        self.backend = Some(backend);
    }

    /// Whether the host should request another tick.
    pub fn should_schedule_next(&self) -> bool {
        self.cancel.is_live()
            && matches!(
                self.state,
                SchedulerState::Idle | SchedulerState::Initializing | SchedulerState::Running
            )
    }

    /// Tear down: release the backend and stop scheduling.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.backend = None;
        if self.state != SchedulerState::Stopped {
            debug!("Frame loop stopped after {} frames", self.frames_presented);
        }
        self.state = SchedulerState::Stopped;
    }

    /// Run one frame.
    ///
    /// Per-frame GPU errors are logged and the frame is dropped; the loop keeps
    /// going. Device loss and cancellation halt it.
    pub fn tick<S: VideoSource + ?Sized>(&mut self, source: &mut S) -> TickOutcome {
        if self.cancel.is_cancelled() {
            self.stop();
            return TickOutcome::Halt;
        }

        match self.state {
            SchedulerState::Stopped | SchedulerState::DeviceLost { .. } => {
                return TickOutcome::Halt
            }
            SchedulerState::Idle => {
                if self.backend.is_some() && source.is_ready() {
                    self.state = SchedulerState::Initializing;
                } else {
                    return TickOutcome::Continue;
                }
            }
            SchedulerState::Initializing | SchedulerState::Running => {}
        }

        let Some(backend) = self.backend.as_mut() else {
            return TickOutcome::Continue;
        };

        if let Some(reason) = backend.lost_reason() {
            error!("Preview halted, device lost: {}", reason);
            self.backend = None;
            self.uploaded_revision = None;
            self.state = SchedulerState::DeviceLost { reason };
            return TickOutcome::Halt;
        }

        if self.state == SchedulerState::Initializing {
            let Some((width, height)) = source.native_size() else {
                return TickOutcome::Continue;
            };
            if let Err(e) = source.play() {
                warn!("Failed to start playback: {}", e);
                return TickOutcome::Continue;
            }
            if let Err(e) = backend.recreate_texture(width, height) {
                error!("Failed to create video texture: {}", e);
                return TickOutcome::Continue;
            }
            self.uploaded_revision = None;
            self.state = SchedulerState::Running;
            info!("Preview running at {}x{}", width, height);
        }

        if let Err(e) = Self::stream_frame(backend, source) {
            warn!("Dropped frame: {}", e);
        }

        let (params, revision) = self.filters.snapshot();
        if self.uploaded_revision != Some(revision) {
            backend.write_params(&params);
            self.uploaded_revision = Some(revision);
        }

        match backend.render() {
            Ok(RenderStatus::Presented) => self.frames_presented += 1,
            Ok(RenderStatus::Skipped) => {}
            Err(e) => warn!("Render failed: {}", e),
        }

        if self.cancel.is_live() {
            TickOutcome::Continue
        } else {
            TickOutcome::Halt
        }
    }

    /// Upload the source's current frame, resizing the texture first if the
    /// resolution changed. The frame handle is released on every path.
    fn stream_frame<S: VideoSource + ?Sized>(backend: &mut B, source: &mut S) -> Result<()> {
        let Some(frame) = source.current_frame()? else {
            return Ok(());
        };

        let size = frame.dimensions();
        if size.0 == 0 || size.1 == 0 {
            return Err(ClipforgeError::Decoder("Source produced an empty frame".into()));
        }
        if backend.texture_size() != Some(size) {
            debug!("Source resolution changed to {}x{}", size.0, size.1);
            backend.recreate_texture(size.0, size.1)?;
        }
        backend.upload_frame(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_core::PatternSource;

    #[derive(Default)]
    struct NullBackend {
        size: Option<(u32, u32)>,
        params_written: usize,
    }

    impl FrameBackend for NullBackend {
        fn texture_size(&self) -> Option<(u32, u32)> {
            self.size
        }

        fn recreate_texture(&mut self, width: u32, height: u32) -> Result<()> {
            self.size = Some((width, height));
            Ok(())
        }

        fn upload_frame(&mut self, _frame: &FrameHandle<'_>) -> Result<()> {
            Ok(())
        }

        fn write_params(&mut self, _params: &FilterParams) {
            self.params_written += 1;
        }

        fn render(&mut self) -> Result<RenderStatus> {
            Ok(RenderStatus::Presented)
        }

        fn lost_reason(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_idle_until_backend_attached() {
        let mut scheduler = FrameScheduler::new(FilterControl::default(), CancelToken::new());
        let mut source = PatternSource::new(4, 4);

        assert_eq!(scheduler.tick(&mut source), TickOutcome::Continue);
        assert_eq!(scheduler.state(), &SchedulerState::Idle);

        scheduler.attach(NullBackend::default());
        assert_eq!(scheduler.tick(&mut source), TickOutcome::Continue);
        assert_eq!(scheduler.state(), &SchedulerState::Running);
        assert_eq!(scheduler.frames_presented(), 1);
    }

    #[test]
    fn test_params_uploaded_only_on_change() {
        let filters = FilterControl::default();
        let mut scheduler = FrameScheduler::new(filters.clone(), CancelToken::new());
        let mut source = PatternSource::new(4, 4);
        scheduler.attach(NullBackend::default());

        for _ in 0..5 {
            scheduler.tick(&mut source);
        }
        assert_eq!(scheduler.backend().map(|b| b.params_written), Some(1));

        filters.update(|p| p.brightness = 0.25);
        scheduler.tick(&mut source);
        scheduler.tick(&mut source);
        assert_eq!(scheduler.backend().map(|b| b.params_written), Some(2));
    }

    #[test]
    fn test_stop_is_terminal() {
        let mut scheduler = FrameScheduler::new(FilterControl::default(), CancelToken::new());
        let mut source = PatternSource::new(4, 4);
        scheduler.attach(NullBackend::default());
        scheduler.tick(&mut source);

        scheduler.stop();
        assert!(!scheduler.should_schedule_next());
        assert!(scheduler.backend().is_none());

        scheduler.attach(NullBackend::default());
        assert!(scheduler.backend().is_none());
        assert_eq!(scheduler.tick(&mut source), TickOutcome::Halt);
    }
}
