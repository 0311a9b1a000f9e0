//! Video-source boundary consumed by the preview frame loop.

use crate::error::Result;
use crate::frame::FrameBuffer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A transient handle on the frame a source is currently presenting.
///
/// The handle is released when it is dropped, so the release happens on
/// every path out of the code that borrowed it, including early returns and
/// `?` propagation.
pub struct FrameHandle<'a> {
    frame: &'a FrameBuffer,
    release: Option<Box<dyn FnOnce() + 'a>>,
}

impl<'a> FrameHandle<'a> {
    /// A handle that runs `release` when dropped.
    pub fn with_release(frame: &'a FrameBuffer, release: impl FnOnce() + 'a) -> Self {
        Self {
            frame,
            release: Some(Box::new(release)),
        }
    }

    pub fn frame(&self) -> &FrameBuffer {
        self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}

impl Drop for FrameHandle<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for FrameHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("width", &self.frame.width)
            .field("height", &self.frame.height)
            .finish_non_exhaustive()
    }
}

/// Counts frame handles that have been lent out and not yet released.
#[derive(Debug, Clone, Default)]
pub struct FrameLeases(Arc<AtomicUsize>);

impl FrameLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lend `frame`, counting it until the handle is dropped.
    pub fn lend<'a>(&'a self, frame: &'a FrameBuffer) -> FrameHandle<'a> {
        self.0.fetch_add(1, Ordering::AcqRel);
        FrameHandle::with_release(frame, move || {
            self.0.fetch_sub(1, Ordering::AcqRel);
        })
    }

    /// Number of handles currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// A playable video handle supplied by the surrounding UI.
///
/// The preview loop only consumes frames; opening files and decoding are the
/// source's business.
pub trait VideoSource {
    /// Native frame size, once the source knows it.
    fn native_size(&self) -> Option<(u32, u32)>;

    /// Whether the source can start playing.
    fn is_ready(&self) -> bool {
        self.native_size().is_some()
    }

    /// Start playback.
    fn play(&mut self) -> Result<()>;

    /// Borrow the frame currently being presented, if there is one.
    fn current_frame(&mut self) -> Result<Option<FrameHandle<'_>>>;

    /// Whether playback has reached the end of the media. The last frame
    /// stays available through [`current_frame`](Self::current_frame).
    fn is_finished(&self) -> bool {
        false
    }
}

/// A source that presents a single still frame, by default the gradient
/// test pattern. Used when the preview is started without a video file.
#[derive(Debug)]
pub struct PatternSource {
    frame: FrameBuffer,
    playing: bool,
    leases: FrameLeases,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_frame(FrameBuffer::test_pattern(width, height))
    }

    pub fn from_frame(frame: FrameBuffer) -> Self {
        Self {
            frame,
            playing: false,
            leases: FrameLeases::new(),
        }
    }

    /// Swap in a new frame, possibly at a different resolution.
    pub fn replace_frame(&mut self, frame: FrameBuffer) {
        self.frame = frame;
    }

    pub fn leases(&self) -> &FrameLeases {
        &self.leases
    }
}

impl VideoSource for PatternSource {
    fn native_size(&self) -> Option<(u32, u32)> {
        Some(self.frame.dimensions())
    }

    fn play(&mut self) -> Result<()> {
        self.playing = true;
        Ok(())
    }

    fn current_frame(&mut self) -> Result<Option<FrameHandle<'_>>> {
        if !self.playing {
            return Ok(None);
        }
        Ok(Some(self.leases.lend(&self.frame)))
    }
}
