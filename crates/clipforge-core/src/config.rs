//! Application configuration.
//!
//! Loaded from JSON. Every field has a default, so a partial file (or no file
//! at all) is valid.

use crate::error::{ClipforgeError, Result};
use crate::filter::FilterParams;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "CLIPFORGE_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub preview: PreviewConfig,
    pub split: SplitConfig,
}

/// Settings for the live preview window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub window_width: u32,
    pub window_height: u32,
    /// Color the render pass clears to before drawing the quad.
    pub clear_color: [f64; 4],
    /// Wait for vertical blank when presenting.
    pub vsync: bool,
    pub max_frame_latency: u32,
    /// Filters applied when the preview opens.
    pub filters: FilterParams,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            window_width: 640,
            window_height: 360,
            clear_color: [0.1, 0.1, 0.1, 1.0],
            vsync: true,
            max_frame_latency: 2,
            filters: FilterParams::IDENTITY,
        }
    }
}

/// Settings for the segment splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Default segment length when none is given on the command line.
    pub segment_seconds: u32,
    /// Keyframe interval in frames (`-g`).
    pub gop_size: u32,
    /// Forced keyframe spacing in seconds.
    pub keyframe_interval_secs: u32,
}

impl SplitConfig {
    /// Segment lengths the UI accepts.
    pub const SEGMENT_SECONDS_RANGE: RangeInclusive<u32> = 1..=60;
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            segment_seconds: 5,
            gop_size: 30,
            keyframe_interval_secs: 3,
        }
    }
}

impl AppConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| ClipforgeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Default config location: `$CLIPFORGE_CONFIG`, else
    /// `<config dir>/clipforge/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("clipforge").join("config.json")))
    }

    /// Load from the default location, falling back to defaults when the file
    /// does not exist. A file that exists but fails to parse is an error.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}
