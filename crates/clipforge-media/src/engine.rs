//! Transcoding engine boundary.
//!
//! The engine exposes a flat private filesystem plus "run FFmpeg with these
//! arguments". Callers stage inputs with [`TranscodeEngine::write_file`], run
//! a command whose relative paths resolve inside that filesystem, then read
//! the outputs back and delete everything they created.

use crate::locate::ffmpeg_binary;
use clipforge_core::{ClipforgeError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// One entry of an engine directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// An FFmpeg-compatible engine with a private scratch filesystem.
pub trait TranscodeEngine {
    /// Make the engine ready. Calling it again once loaded is a no-op.
    fn load(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Run FFmpeg with `args`. Relative paths resolve inside the scratch filesystem.
    fn exec(&mut self, args: &[String]) -> Result<()>;

    /// List a directory. The scratch filesystem is flat; `/` is its root.
    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>>;

    fn read_file(&self, name: &str) -> Result<Vec<u8>>;

    fn delete_file(&mut self, name: &str) -> Result<()>;
}

/// [`TranscodeEngine`] that runs the FFmpeg executable in a private
/// temporary directory. The directory is removed when the engine is dropped.
pub struct FfmpegEngine {
    binary: Option<PathBuf>,
    root: PathBuf,
}

impl FfmpegEngine {
    /// Create the scratch directory. The binary is resolved on [`load`](TranscodeEngine::load).
    pub fn new() -> Result<Self> {
        let root = std::env::temp_dir().join(format!("clipforge-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root)?;
        debug!("Engine scratch directory: {}", root.display());
        Ok(Self { binary: None, root })
    }

    /// Use a specific FFmpeg executable instead of searching for one.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Result<Self> {
        let mut engine = Self::new()?;
        engine.binary = Some(binary.into());
        Ok(engine)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an engine file name to a path in the scratch directory.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let name = name.trim_start_matches('/');
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ClipforgeError::InvalidParameter(format!(
                "Invalid engine file name: {:?}",
                name
            )));
        }
        Ok(self.root.join(name))
    }
}

impl TranscodeEngine for FfmpegEngine {
    fn load(&mut self) -> Result<()> {
        if self.binary.is_none() {
            let binary = ffmpeg_binary()?;
            info!("Transcoding engine loaded: {}", binary.display());
            self.binary = Some(binary);
        }
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.binary.is_some()
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(name)?;
        std::fs::write(&path, data)?;
        debug!("Wrote {} ({} bytes)", name, data.len());
        Ok(())
    }

    fn exec(&mut self, args: &[String]) -> Result<()> {
        let binary = self
            .binary
            .as_ref()
            .ok_or_else(|| ClipforgeError::Transcode("Engine not loaded".into()))?;

        debug!("ffmpeg {}", args.join(" "));
        let output = Command::new(binary)
            .args(["-hide_banner", "-nostdin"])
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ClipforgeError::Transcode(format!("Failed to spawn ffmpeg: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(target: "ffmpeg", "{}", line);
        }

        if !output.status.success() {
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output");
            warn!("ffmpeg failed ({}): {}", output.status, detail);
            return Err(ClipforgeError::Transcode(format!(
                "ffmpeg exited with status {}: {}",
                output.status, detail
            )));
        }

        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        if path != "/" {
            return Err(ClipforgeError::NotFound(format!("No such directory: {}", path)));
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(entries)
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(name)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ClipforgeError::NotFound(format!("No such file: {}", name))
            }
            _ => e.into(),
        })
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ClipforgeError::NotFound(format!("No such file: {}", name))
            }
            _ => e.into(),
        })
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!("Failed to remove {}: {}", self.root.display(), e);
        }
    }
}
