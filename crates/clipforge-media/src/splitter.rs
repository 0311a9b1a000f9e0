//! Splitting a video into fixed-length segments.
//!
//! The splitter stages the input in the engine's scratch filesystem, runs the
//! segment muxer, then reads back every `output_<n>.mp4` in numeric order.
//! Staged and produced files are deleted whether or not the run succeeded.

use crate::engine::{DirEntry, TranscodeEngine};
use clipforge_core::{ClipforgeError, Result, SplitConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name the input is staged under.
pub const INPUT_NAME: &str = "input.mp4";
/// Prefix of produced segment files.
pub const OUTPUT_PREFIX: &str = "output_";
const OUTPUT_EXTENSION: &str = ".mp4";

/// One produced clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSegment {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl OutputSegment {
    /// Zero-based position of this segment in the source.
    pub fn index(&self) -> Option<u32> {
        segment_index(&self.name)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the clip into `dir` under its segment name.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Write every segment into `dir`, or none of them.
///
/// Segments are written to a staging directory next to `dir` and moved into
/// place once all writes succeeded. Returns the final paths in input order.
pub fn save_segments(segments: &[OutputSegment], dir: &Path) -> Result<Vec<PathBuf>> {
    let parent = match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let dir_name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ClipforgeError::InvalidParameter(format!("Not a directory name: {}", dir.display()))
        })?;
    std::fs::create_dir_all(&parent)?;

    let staging = parent.join(format!(".{dir_name}.partial-{}", uuid::Uuid::new_v4()));
    let staged = segments
        .iter()
        .map(|segment| segment.save_to(&staging))
        .collect::<Result<Vec<_>>>();
    if let Err(e) = staged {
        remove_staging(&staging);
        return Err(e);
    }

    if !dir.exists() {
        if let Err(e) = std::fs::rename(&staging, dir) {
            remove_staging(&staging);
            return Err(e.into());
        }
        debug!("Moved {} into place", dir.display());
        return Ok(segments.iter().map(|segment| dir.join(&segment.name)).collect());
    }

    // Existing directory: move files one by one, undoing on failure
    let mut moved: Vec<PathBuf> = Vec::with_capacity(segments.len());
    for segment in segments {
        let target = dir.join(&segment.name);
        if let Err(e) = std::fs::rename(staging.join(&segment.name), &target) {
            for path in &moved {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), err);
                }
            }
            remove_staging(&staging);
            return Err(e.into());
        }
        moved.push(target);
    }
    remove_staging(&staging);
    Ok(moved)
}

fn remove_staging(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", staging.display(), e);
        }
    }
}

/// FFmpeg arguments that cut [`INPUT_NAME`] into `seconds`-long segments.
///
/// Keyframes are forced at a fixed interval and scene-cut detection is off so
/// every segment can start on a keyframe close to its nominal boundary.
pub fn segment_args(seconds: u32, config: &SplitConfig) -> Vec<String> {
    vec![
        "-i".into(),
        INPUT_NAME.into(),
        "-f".into(),
        "segment".into(),
        "-segment_time".into(),
        seconds.to_string(),
        "-g".into(),
        config.gop_size.to_string(),
        "-sc_threshold".into(),
        "0".into(),
        "-force_key_frames".into(),
        format!("expr:gte(t,n_forced*{})", config.keyframe_interval_secs),
        "-reset_timestamps".into(),
        "1".into(),
        "-map".into(),
        "0".into(),
        format!("{OUTPUT_PREFIX}%d{OUTPUT_EXTENSION}"),
    ]
}

/// Numeric index of a segment file name: `output_12.mp4` is 12.
pub fn segment_index(name: &str) -> Option<u32> {
    name.strip_prefix(OUTPUT_PREFIX)?
        .strip_suffix(OUTPUT_EXTENSION)?
        .parse()
        .ok()
}

/// Number of segments a `duration_secs` input yields at `seconds` per segment.
pub fn expected_segment_count(duration_secs: f64, seconds: u32) -> usize {
    if duration_secs <= 0.0 || seconds == 0 {
        return 0;
    }
    (duration_secs / seconds as f64).ceil() as usize
}

/// Segment files in a listing, sorted by numeric index.
fn segment_names(entries: &[DirEntry]) -> Vec<String> {
    let mut indexed: Vec<(u32, &str)> = entries
        .iter()
        .filter(|entry| !entry.is_dir)
        .filter_map(|entry| segment_index(&entry.name).map(|i| (i, entry.name.as_str())))
        .collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, name)| name.to_string()).collect()
}

/// Any failure while splitting is reported as one transcode error.
fn as_transcode(err: ClipforgeError) -> ClipforgeError {
    match err {
        ClipforgeError::Transcode(_) => err,
        other => ClipforgeError::Transcode(other.to_string()),
    }
}

/// Runs the segment workflow on a [`TranscodeEngine`].
pub struct SegmentSplitter<E> {
    engine: E,
    config: SplitConfig,
}

impl<E: TranscodeEngine> SegmentSplitter<E> {
    pub fn new(engine: E, config: SplitConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Split `input` into `seconds`-long segments.
    ///
    /// Either every segment is returned or none is.
    pub fn split(&mut self, input: &[u8], seconds: u32) -> Result<Vec<OutputSegment>> {
        if seconds == 0 {
            return Err(ClipforgeError::InvalidParameter(
                "Segment length must be at least one second".into(),
            ));
        }

        self.engine.load().map_err(as_transcode)?;

        info!("Splitting {} bytes into {}s segments", input.len(), seconds);
        let result = self.run(input, seconds);
        self.cleanup();

        let segments = result.map_err(as_transcode)?;
        info!("Produced {} segments", segments.len());
        Ok(segments)
    }

    fn run(&mut self, input: &[u8], seconds: u32) -> Result<Vec<OutputSegment>> {
        self.engine.write_file(INPUT_NAME, input)?;
        self.engine.exec(&segment_args(seconds, &self.config))?;

        let names = segment_names(&self.engine.list_dir("/")?);
        if names.is_empty() {
            warn!("Segment muxer produced no files");
        }

        names
            .into_iter()
            .map(|name| {
                let bytes = self.engine.read_file(&name)?;
                debug!("Read {} ({} bytes)", name, bytes.len());
                Ok(OutputSegment { name, bytes })
            })
            .collect()
    }

    /// Delete the staged input and every produced segment.
    fn cleanup(&mut self) {
        let mut leftovers = vec![INPUT_NAME.to_string()];
        match self.engine.list_dir("/") {
            Ok(entries) => leftovers.extend(segment_names(&entries)),
            Err(e) => warn!("Could not list engine files for cleanup: {}", e),
        }

        for name in leftovers {
            match self.engine.delete_file(&name) {
                Ok(()) | Err(ClipforgeError::NotFound(_)) => {}
                Err(e) => warn!("Failed to delete {}: {}", name, e),
            }
        }
    }
}
