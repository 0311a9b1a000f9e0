//! Integration test crate for ClipForge.
//!
//! This crate exists solely to hold cross-crate integration tests. None of
//! them need a GPU or an FFmpeg binary: the GPU, host and transcoding engine
//! are replaced by in-memory fakes behind the same traits the real
//! implementations use.

#[cfg(test)]
mod capability;

#[cfg(test)]
mod scheduler;

#[cfg(test)]
mod splitter;
