//! Error types for ClipForge.

use thiserror::Error;

/// Main error type for ClipForge operations.
///
/// GPU capability failures are not errors: they are reported as an
/// `Unsupported` probe result with a reason string.
#[derive(Error, Debug)]
pub enum ClipforgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type alias for ClipForge operations.
pub type Result<T> = std::result::Result<T, ClipforgeError>;
