//! Ethogram Common Utilities
//!
//! Shared infrastructure for all Ethogram crates:
//! - Error types and result aliases
//! - Playback cursor used as the "current time" source during annotation
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod playback;

pub use config::*;
pub use error::*;
pub use playback::*;
