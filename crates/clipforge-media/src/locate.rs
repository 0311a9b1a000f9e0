//! Resolving the FFmpeg executables.
//!
//! Lookup order: the system `PATH`, then the location ffmpeg-sidecar manages.
//! If neither has the binary, ffmpeg-sidecar downloads a static build into
//! its managed location.

use clipforge_core::{ClipforgeError, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Path to a usable `ffmpeg` executable.
pub fn ffmpeg_binary() -> Result<PathBuf> {
    locate("ffmpeg", ffmpeg_sidecar::paths::ffmpeg_path)
}

/// Path to a usable `ffprobe` executable.
pub fn ffprobe_binary() -> Result<PathBuf> {
    locate("ffprobe", ffmpeg_sidecar::ffprobe::ffprobe_path)
}

fn locate(name: &str, sidecar_path: fn() -> PathBuf) -> Result<PathBuf> {
    if let Ok(path) = which::which(name) {
        debug!("Using {} from PATH: {}", name, path.display());
        return Ok(path);
    }

    let managed = sidecar_path();
    if managed.is_absolute() && managed.exists() {
        debug!("Using managed {}: {}", name, managed.display());
        return Ok(managed);
    }

    info!("{} not found, downloading a static build", name);
    ffmpeg_sidecar::download::auto_download()
        .map_err(|e| ClipforgeError::Transcode(format!("Failed to download FFmpeg: {e}")))?;

    let managed = sidecar_path();
    if managed.exists() {
        Ok(managed)
    } else {
        Err(ClipforgeError::NotFound(format!(
            "{} is not installed and could not be downloaded",
            name
        )))
    }
}
