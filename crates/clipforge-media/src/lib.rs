//! ClipForge Media - FFmpeg integration
//!
//! This crate handles:
//! - Locating (or downloading) the FFmpeg binaries
//! - The transcoding-engine boundary and its FFmpeg implementation
//! - Splitting a video into fixed-length segments
//! - Decoding a file into a live preview source
//! - Media file probing

pub mod decoder;
pub mod engine;
pub mod locate;
pub mod probe;
pub mod splitter;

pub use decoder::FfmpegVideoSource;
pub use engine::{DirEntry, FfmpegEngine, TranscodeEngine};
pub use locate::{ffmpeg_binary, ffprobe_binary};
pub use probe::{MediaProbe, VideoStreamInfo};
pub use splitter::{
    expected_segment_count, save_segments, segment_args, OutputSegment, SegmentSplitter,
};
