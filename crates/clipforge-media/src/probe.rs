//! Media file probing to get metadata without full decode.

use crate::locate::ffprobe_binary;
use clipforge_core::{ClipforgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Information about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaProbe {
    /// File path
    pub path: String,
    /// Duration in seconds, 0 when unknown
    pub duration_secs: f64,
    /// Video streams
    pub video_streams: Vec<VideoStreamInfo>,
    /// Number of audio streams
    pub audio_streams: usize,
    /// Container format
    pub format: String,
}

/// Information about a video stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub index: usize,
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub pixel_format: String,
    /// Display rotation in degrees, normalized to `0..360`
    #[serde(default)]
    pub rotation: u32,
}

impl VideoStreamInfo {
    /// Frame size after FFmpeg applies the rotation, which it does by
    /// default when decoding.
    pub fn display_size(&self) -> (u32, u32) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}

// ── ffprobe JSON ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix, or the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|tags| tags.rotate.as_deref())
                    .and_then(|r| r.trim().parse().ok())
            })
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360) as u32
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0).then_some(value)
}

impl MediaProbe {
    /// Probe a media file with ffprobe.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(ClipforgeError::NotFound(format!(
                "File not found: {}",
                path_str
            )));
        }

        let ffprobe = ffprobe_binary()?;
        let output = Command::new(&ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| ClipforgeError::Decoder(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ClipforgeError::Decoder(format!(
                "ffprobe failed on {}: {}",
                path_str,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe = Self::from_json(&path_str, &String::from_utf8_lossy(&output.stdout))?;
        debug!(
            "Probed {}: {:.2}s, {} video / {} audio streams",
            path_str,
            probe.duration_secs,
            probe.video_streams.len(),
            probe.audio_streams
        );
        Ok(probe)
    }

    /// Build a probe from ffprobe's JSON output.
    pub fn from_json(path: &str, json: &str) -> Result<Self> {
        let parsed: FfprobeOutput = serde_json::from_str(json)
            .map_err(|e| ClipforgeError::Decoder(format!("Bad ffprobe output: {e}")))?;

        let mut video_streams = Vec::new();
        let mut audio_streams = 0;
        let mut stream_duration: Option<f64> = None;

        for stream in parsed.streams {
            match stream.codec_type.as_deref() {
                Some("video") => {
                    let (Some(width), Some(height)) = (stream.width, stream.height) else {
                        continue;
                    };
                    if stream_duration.is_none() {
                        stream_duration = stream.duration.as_deref().and_then(|d| d.parse().ok());
                    }
                    let frame_rate = stream
                        .avg_frame_rate
                        .as_deref()
                        .and_then(parse_frame_rate)
                        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
                        .unwrap_or(0.0);
                    let rotation = stream.rotation();
                    video_streams.push(VideoStreamInfo {
                        index: stream.index,
                        codec: stream.codec_name.unwrap_or_default(),
                        width,
                        height,
                        frame_rate,
                        pixel_format: stream.pix_fmt.unwrap_or_default(),
                        rotation,
                    });
                }
                Some("audio") => audio_streams += 1,
                _ => {}
            }
        }

        // Container duration is more reliable than the stream's
        let format_duration = parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok());

        Ok(Self {
            path: path.to_string(),
            duration_secs: format_duration.or(stream_duration).unwrap_or(0.0),
            video_streams,
            audio_streams,
            format: parsed
                .format
                .and_then(|f| f.format_name)
                .unwrap_or_default(),
        })
    }

    /// Check if the file has video.
    pub fn has_video(&self) -> bool {
        !self.video_streams.is_empty()
    }

    /// Check if the file has audio.
    pub fn has_audio(&self) -> bool {
        self.audio_streams > 0
    }

    /// Get the primary video stream info.
    pub fn primary_video(&self) -> Option<&VideoStreamInfo> {
        self.video_streams.first()
    }
}
