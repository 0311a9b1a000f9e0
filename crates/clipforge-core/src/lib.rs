//! ClipForge Core - foundation types shared by the preview and clipping tools
//!
//! This crate provides:
//! - The crate-wide error type
//! - Filter parameters and their CPU reference math
//! - RGBA frame buffers
//! - The video-source boundary and per-frame handles
//! - Cancellation tokens and application configuration

pub mod cancel;
pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod source;

pub use cancel::CancelToken;
pub use config::{AppConfig, PreviewConfig, SplitConfig};
pub use error::{ClipforgeError, Result};
pub use filter::{FilterControl, FilterParams, FilterUniform};
pub use frame::FrameBuffer;
pub use source::{FrameHandle, FrameLeases, PatternSource, VideoSource};
