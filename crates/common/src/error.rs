//! Error types shared across Ethogram crates.

use std::path::PathBuf;

/// Top-level error type for operations that do not belong to a single
/// domain crate, mostly configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum EthogramError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using EthogramError.
pub type EthogramResult<T> = Result<T, EthogramError>;

impl EthogramError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
