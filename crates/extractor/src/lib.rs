//! Ethogram Epoch Extractor
//!
//! Cuts every committed mark out of every source video of a catalog:
//! a short clip per `State` interval and a still frame per `Event`.
//!
//! # Pipeline
//!
//! ```text
//! catalog ──┐
//!           ├── for each definition ── for each mark ── for each source
//! videos ───┘                                                  │
//!                                                   FrameSource (ffmpeg)
//!                                                              │
//!                                          name_2_4(0).avi  name_1(1).jpg
//! ```

pub mod epochs;
pub mod error;
pub mod source;

pub use epochs::*;
pub use error::*;
pub use source::*;
