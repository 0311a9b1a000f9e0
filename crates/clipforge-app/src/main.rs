//! ClipForge - GPU video preview and segment splitter
//!
//! Entry point and command dispatch.

mod preview;

use anyhow::{bail, Context, Result};
use clipforge_core::{AppConfig, SplitConfig};
use clipforge_gpu::{GpuView, WgpuHost};
use clipforge_media::{
    expected_segment_count, save_segments, FfmpegEngine, MediaProbe, SegmentSplitter,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = "\
Usage:
  clipforge probe                              Report GPU acceleration support
  clipforge preview [video]                    Open the live filtered preview
  clipforge split <video> [seconds] [out_dir]  Split a video into segments

Preview keys: Up/Down brightness, Left/Right contrast, G grayscale, R reset, Esc quit";

fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load_or_default()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("probe") => probe(),
        Some("preview") => preview::run(args.get(1).map(PathBuf::from), &config),
        Some("split") => {
            let Some(video) = args.get(1) else {
                bail!("split needs a video file\n\n{USAGE}");
            };
            let seconds = match args.get(2) {
                Some(s) => s
                    .parse::<u32>()
                    .with_context(|| format!("Invalid segment length: {s}"))?,
                None => config.split.segment_seconds,
            };
            split(
                Path::new(video),
                seconds,
                args.get(3).map(PathBuf::from),
                &config.split,
            )
        }
        _ => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

fn probe() -> Result<()> {
    let host = WgpuHost::new();
    let view = GpuView::new();
    // The device is only needed to prove it can be created
    let device = view.refresh_blocking(&host);
    println!("{}", view.status());
    drop(device);
    Ok(())
}

fn split(video: &Path, seconds: u32, out_dir: Option<PathBuf>, config: &SplitConfig) -> Result<()> {
    if !SplitConfig::SEGMENT_SECONDS_RANGE.contains(&seconds) {
        bail!(
            "Segment length must be between {} and {} seconds",
            SplitConfig::SEGMENT_SECONDS_RANGE.start(),
            SplitConfig::SEGMENT_SECONDS_RANGE.end()
        );
    }

    let out_dir = out_dir.unwrap_or_else(|| {
        let stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        PathBuf::from(format!("{stem}_segments"))
    });

    match MediaProbe::probe(video) {
        Ok(probe) => info!(
            "{:.1}s of video, expecting {} segments",
            probe.duration_secs,
            expected_segment_count(probe.duration_secs, seconds)
        ),
        Err(e) => warn!("Could not probe {}: {}", video.display(), e),
    }

    let input =
        std::fs::read(video).with_context(|| format!("Failed to read {}", video.display()))?;

    let engine = FfmpegEngine::new()?;
    let mut splitter = SegmentSplitter::new(engine, config.clone());
    let segments = splitter.split(&input, seconds)?;

    if segments.is_empty() {
        println!("No segments created");
        return Ok(());
    }

    let paths = save_segments(&segments, &out_dir)
        .with_context(|| format!("Failed to save segments to {}", out_dir.display()))?;
    for (path, segment) in paths.iter().zip(&segments) {
        println!("{} ({} bytes)", path.display(), segment.len());
    }
    info!("Wrote {} segments to {}", segments.len(), out_dir.display());
    Ok(())
}
