//! Live video source decoded by an FFmpeg subprocess.
//!
//! FFmpeg decodes the file to raw RGBA at playback speed (`-re`) on its
//! stdout. A reader thread slices that stream into frames and hands them to
//! the preview over a small bounded channel; the preview always shows the
//! newest frame it has received.

use crate::locate::ffmpeg_binary;
use crate::probe::MediaProbe;
use clipforge_core::{
    CancelToken, ClipforgeError, FrameBuffer, FrameHandle, FrameLeases, Result, VideoSource,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Decoded frames buffered between the reader thread and the preview.
const FRAME_QUEUE_DEPTH: usize = 2;

enum DecodeEvent {
    Frame(FrameBuffer),
    Error(String),
    Finished,
}

struct DecodeWorker {
    child: Child,
    events: Receiver<DecodeEvent>,
    reader: JoinHandle<()>,
    cancel: CancelToken,
}

impl DecodeWorker {
    fn stop(self) {
        let Self {
            mut child,
            events,
            reader,
            cancel,
        } = self;
        cancel.cancel();
        let _ = child.kill();
        // Unblocks a reader waiting on a full queue
        drop(events);
        let _ = child.wait();
        if reader.join().is_err() {
            warn!("Decoder reader thread panicked");
        }
    }
}

/// [`VideoSource`] that plays a file through FFmpeg.
pub struct FfmpegVideoSource {
    path: PathBuf,
    binary: PathBuf,
    width: u32,
    height: u32,
    worker: Option<DecodeWorker>,
    current: Option<FrameBuffer>,
    leases: FrameLeases,
    finished: bool,
}

impl FfmpegVideoSource {
    /// Probe `path` for its native size. Decoding starts on [`play`](VideoSource::play).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let probe = MediaProbe::probe(path)?;
        let video = probe.primary_video().ok_or_else(|| {
            ClipforgeError::Decoder(format!("{} has no video stream", path.display()))
        })?;

        // FFmpeg rotates while decoding, so frames arrive in display orientation
        let (width, height) = video.display_size();
        info!(
            "Opened {} ({}x{} {} @ {:.2} fps, rotated {})",
            path.display(),
            width,
            height,
            video.codec,
            video.frame_rate,
            video.rotation
        );

        Ok(Self {
            path: path.to_path_buf(),
            binary: ffmpeg_binary()?,
            width,
            height,
            worker: None,
            current: None,
            leases: FrameLeases::new(),
            finished: false,
        })
    }

    pub fn leases(&self) -> &FrameLeases {
        &self.leases
    }

    fn spawn_worker(&self) -> Result<DecodeWorker> {
        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-re", "-i"])
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-an", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ClipforgeError::Decoder(format!("Failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClipforgeError::Decoder("Failed to open ffmpeg stdout".into()))?;

        let (tx, events) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let cancel = CancelToken::new();
        let (width, height) = (self.width, self.height);
        let reader_cancel = cancel.clone();
        let reader = match std::thread::Builder::new()
            .name("clipforge-decode".into())
            .spawn(move || read_frames(stdout, width, height, tx, reader_cancel))
        {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        };

        Ok(DecodeWorker {
            child,
            events,
            reader,
            cancel,
        })
    }
}

/// Slice a raw RGBA stream into frames until it ends, the receiver goes away
/// or `cancel` fires. A trailing partial frame counts as the end.
fn read_frames(
    mut stdout: impl Read,
    width: u32,
    height: u32,
    tx: Sender<DecodeEvent>,
    cancel: CancelToken,
) {
    let frame_len = width as usize * height as usize * FrameBuffer::BYTES_PER_PIXEL;
    let mut decoded = 0u64;

    while cancel.is_live() {
        let mut data = vec![0u8; frame_len];
        match stdout.read_exact(&mut data) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Decoder finished after {} frames", decoded);
                let _ = tx.send(DecodeEvent::Finished);
                return;
            }
            Err(e) => {
                if cancel.is_live() {
                    let _ = tx.send(DecodeEvent::Error(e.to_string()));
                }
                return;
            }
        }

        let event = match FrameBuffer::from_packed(width, height, data) {
            Ok(frame) => DecodeEvent::Frame(frame),
            Err(e) => DecodeEvent::Error(e.to_string()),
        };
        if tx.send(event).is_err() {
            return;
        }
        decoded += 1;
    }
}

impl VideoSource for FfmpegVideoSource {
    fn native_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn play(&mut self) -> Result<()> {
        if self.worker.is_none() {
            self.worker = Some(self.spawn_worker()?);
            self.finished = false;
            debug!("Playback started");
        }
        Ok(())
    }

    fn current_frame(&mut self) -> Result<Option<FrameHandle<'_>>> {
        if let Some(worker) = &self.worker {
            drain_events(&worker.events, &mut self.current, &mut self.finished)?;
        }

        Ok(self.current.as_ref().map(|frame| self.leases.lend(frame)))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Take everything queued, keeping only the newest frame.
fn drain_events(
    events: &Receiver<DecodeEvent>,
    current: &mut Option<FrameBuffer>,
    finished: &mut bool,
) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(DecodeEvent::Frame(frame)) => *current = Some(frame),
            Ok(DecodeEvent::Error(message)) => return Err(ClipforgeError::Decoder(message)),
            Ok(DecodeEvent::Finished) => *finished = true,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
        }
    }
}

impl Drop for FfmpegVideoSource {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}
