//! Integration tests for the preview frame loop.
//!
//! Drives `FrameScheduler` against a recording backend and the core
//! `PatternSource`.

use clipforge_core::{
    CancelToken, ClipforgeError, FilterControl, FilterParams, FrameBuffer, FrameHandle,
    PatternSource, Result, VideoSource,
};
use clipforge_gpu::{
    DeviceLossSignal, FrameBackend, FrameScheduler, RenderStatus, SchedulerState, TickOutcome,
};

#[derive(Default)]
struct RecordingBackend {
    texture: Option<(u32, u32)>,
    generation: u64,
    uploads: usize,
    mismatched_uploads: usize,
    fail_uploads: bool,
    params: Vec<FilterParams>,
    renders: usize,
    loss: DeviceLossSignal,
}

impl FrameBackend for RecordingBackend {
    fn texture_size(&self) -> Option<(u32, u32)> {
        self.texture
    }

    fn recreate_texture(&mut self, width: u32, height: u32) -> Result<()> {
        self.texture = Some((width, height));
        self.generation += 1;
        Ok(())
    }

    fn upload_frame(&mut self, frame: &FrameHandle<'_>) -> Result<()> {
        if self.texture != Some(frame.dimensions()) {
            self.mismatched_uploads += 1;
            return Err(ClipforgeError::Gpu("size mismatch".into()));
        }
        if self.fail_uploads {
            return Err(ClipforgeError::Gpu("upload failed".into()));
        }
        self.uploads += 1;
        Ok(())
    }

    fn write_params(&mut self, params: &FilterParams) {
        self.params.push(*params);
    }

    fn render(&mut self) -> Result<RenderStatus> {
        self.renders += 1;
        Ok(RenderStatus::Presented)
    }

    fn lost_reason(&self) -> Option<String> {
        self.loss.reason()
    }
}

fn running(
    backend: RecordingBackend,
    source: &mut PatternSource,
) -> (FrameScheduler<RecordingBackend>, FilterControl, CancelToken) {
    let filters = FilterControl::default();
    let cancel = CancelToken::new();
    let mut scheduler = FrameScheduler::new(filters.clone(), cancel.clone());
    scheduler.attach(backend);
    assert_eq!(scheduler.tick(source), TickOutcome::Continue);
    assert_eq!(scheduler.state(), &SchedulerState::Running);
    (scheduler, filters, cancel)
}

#[test]
fn ten_thousand_ticks_leave_no_frame_handles_outstanding() {
    let mut source = PatternSource::new(32, 18);
    let leases = source.leases().clone();
    let (mut scheduler, _, _) = running(RecordingBackend::default(), &mut source);

    for _ in 1..10_000 {
        assert_eq!(scheduler.tick(&mut source), TickOutcome::Continue);
        assert_eq!(leases.outstanding(), 0);
    }

    let backend = scheduler.backend().unwrap();
    assert_eq!(backend.uploads, 10_000);
    assert_eq!(backend.renders, 10_000);
    assert_eq!(scheduler.frames_presented(), 10_000);
}

#[test]
fn failed_uploads_still_release_frame_handles() {
    let mut source = PatternSource::new(8, 8);
    let leases = source.leases().clone();
    let backend = RecordingBackend {
        fail_uploads: true,
        ..Default::default()
    };
    let (mut scheduler, _, _) = running(backend, &mut source);

    for _ in 0..100 {
        assert_eq!(scheduler.tick(&mut source), TickOutcome::Continue);
    }
    assert_eq!(leases.outstanding(), 0);
    assert_eq!(scheduler.state(), &SchedulerState::Running);
    assert_eq!(scheduler.backend().unwrap().uploads, 0);
}

#[test]
fn resolution_change_rebuilds_texture_before_upload() {
    let mut source = PatternSource::new(640, 360);
    let (mut scheduler, _, _) = running(RecordingBackend::default(), &mut source);
    let first_generation = scheduler.backend().unwrap().generation;

    source.replace_frame(FrameBuffer::test_pattern(1280, 720));
    scheduler.tick(&mut source);

    let backend = scheduler.backend().unwrap();
    assert_eq!(backend.texture, Some((1280, 720)));
    assert_eq!(backend.generation, first_generation + 1);
    assert_eq!(backend.mismatched_uploads, 0);

    // Same size again: no rebuild
    scheduler.tick(&mut source);
    assert_eq!(scheduler.backend().unwrap().generation, first_generation + 1);
}

#[test]
fn filter_changes_are_uploaded_last_writer_wins() {
    let mut source = PatternSource::new(4, 4);
    let (mut scheduler, filters, _) = running(RecordingBackend::default(), &mut source);
    assert_eq!(
        scheduler.backend().unwrap().params,
        vec![FilterParams::IDENTITY]
    );

    let gray = FilterParams {
        grayscale: 1.0,
        ..FilterParams::IDENTITY
    };
    let bright = FilterParams {
        brightness: 0.5,
        ..FilterParams::IDENTITY
    };
    filters.set(gray);
    filters.set(bright);
    scheduler.tick(&mut source);
    scheduler.tick(&mut source);

    assert_eq!(
        scheduler.backend().unwrap().params,
        vec![FilterParams::IDENTITY, bright]
    );
}

#[test]
fn cancellation_stops_the_loop_and_releases_the_backend() {
    let mut source = PatternSource::new(4, 4);
    let (mut scheduler, _, cancel) = running(RecordingBackend::default(), &mut source);
    assert!(scheduler.should_schedule_next());

    cancel.cancel();
    assert!(!scheduler.should_schedule_next());
    assert_eq!(scheduler.tick(&mut source), TickOutcome::Halt);
    assert_eq!(scheduler.state(), &SchedulerState::Stopped);
    assert!(scheduler.backend().is_none());

    // Further ticks do nothing
    let presented = scheduler.frames_presented();
    assert_eq!(scheduler.tick(&mut source), TickOutcome::Halt);
    assert_eq!(scheduler.frames_presented(), presented);
}

#[test]
fn device_loss_halts_then_reinitializes_with_a_new_backend() {
    let mut source = PatternSource::new(16, 9);
    let backend = RecordingBackend::default();
    let loss = backend.loss.clone();
    let (mut scheduler, _, _) = running(backend, &mut source);

    loss.raise("driver reset");
    assert_eq!(scheduler.tick(&mut source), TickOutcome::Halt);
    assert_eq!(
        scheduler.state(),
        &SchedulerState::DeviceLost {
            reason: "driver reset".into()
        }
    );
    assert!(scheduler.backend().is_none());
    assert!(!scheduler.should_schedule_next());
    assert_eq!(source.leases().outstanding(), 0);

    scheduler.attach(RecordingBackend::default());
    assert_eq!(scheduler.state(), &SchedulerState::Initializing);
    assert!(scheduler.should_schedule_next());

    assert_eq!(scheduler.tick(&mut source), TickOutcome::Continue);
    assert_eq!(scheduler.state(), &SchedulerState::Running);
    let backend = scheduler.backend().unwrap();
    assert_eq!(backend.texture, Some((16, 9)));
    assert_eq!(backend.params.len(), 1);
    assert_eq!(backend.uploads, 1);
}

#[test]
fn source_that_is_not_ready_keeps_scheduler_idle() {
    struct Pending;

    impl VideoSource for Pending {
        fn native_size(&self) -> Option<(u32, u32)> {
            None
        }

        fn play(&mut self) -> Result<()> {
            Ok(())
        }

        fn current_frame(&mut self) -> Result<Option<FrameHandle<'_>>> {
            Ok(None)
        }
    }

    let mut scheduler = FrameScheduler::new(FilterControl::default(), CancelToken::new());
    scheduler.attach(RecordingBackend::default());
    assert_eq!(scheduler.tick(&mut Pending), TickOutcome::Continue);
    assert_eq!(scheduler.state(), &SchedulerState::Idle);
    assert_eq!(scheduler.backend().unwrap().renders, 0);
}
