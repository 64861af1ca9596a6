//! Errors raised by catalog mutation and persistence.

use std::path::PathBuf;

use crate::behavior::{BehaviorId, BehaviorKind};

/// Errors that can occur when working with a behavior catalog.
///
/// All of these are caller-side contract violations or unreadable
/// persisted data; none is recovered from silently.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Behavior name '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Invalid behavior name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Behavior '{name}' is a {kind} behavior and cannot hold {mark}")]
    MarkKindMismatch {
        name: String,
        kind: BehaviorKind,
        mark: String,
    },

    #[error("Behavior id {id} is not defined (catalog holds {count})")]
    UnknownBehavior { id: BehaviorId, count: usize },

    #[error("Directory {path} is not empty")]
    DirectoryNotEmpty { path: PathBuf },

    #[error("Malformed behavior file {path}: {message}")]
    SchemaLoad { path: PathBuf, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Result type alias using CatalogError.
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub(crate) fn schema(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SchemaLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
