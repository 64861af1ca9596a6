//! Ethogram Recorder
//!
//! Turns trigger key presses at the current playback time into committed
//! marks on the active behavior catalog.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │            AnnotationSession              │
//! │  ┌────────┐   ┌──────────────────┐        │
//! │  │ Keymap │──▶│ BehaviorRecorder │        │
//! │  └────────┘   └────────┬─────────┘        │
//! │                        ▼                  │
//! │               ┌─────────────────┐         │
//! │               │ BehaviorCatalog │──▶ disk │
//! │               └─────────────────┘         │
//! │         notifications ──▶ viewer          │
//! └───────────────────────────────────────────┘
//! ```

pub mod input;
pub mod keymap;
pub mod recorder;
pub mod session;

pub use input::*;
pub use keymap::*;
pub use recorder::*;
pub use session::*;
