//! Ethogram Behavior Model
//!
//! Defines the core data contracts for an annotation session:
//! - **Behavior definitions:** named `Event` or `State` behaviors with a
//!   display color and free-text note
//! - **Time marks:** committed timestamps (events) or closed intervals
//!   (states), all in milliseconds from the start of the recordings
//! - **Catalog:** the ordered set of definitions plus the shared list of
//!   source videos, with directory and header persistence
//!
//! Definition ids are always dense positions in the catalog.

pub mod behavior;
pub mod catalog;
pub mod error;
pub mod persist;

pub use behavior::*;
pub use catalog::*;
pub use error::*;
pub use persist::*;
