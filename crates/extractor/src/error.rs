//! Extraction error types.

use std::path::PathBuf;

use ethogram_model::TimestampMs;

/// Errors raised while cutting epochs out of source videos.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Cannot open source video {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Failed to read frames from {path} at {at_ms}ms: {reason}")]
    FrameRead {
        path: PathBuf,
        at_ms: TimestampMs,
        reason: String,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("None of the catalog's source videos could be opened")]
    NoReadableSource,

    #[error("Frame backend '{backend}' is not available on this system")]
    BackendUnavailable { backend: String },

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Result type alias using ExtractError.
pub type ExtractResult<T> = Result<T, ExtractError>;
