//! Document mutator
//!
//! Writes back to documents selected by a scan.

mod updater;

pub use updater::{DeleteOutcome, DeleteReturn, DocumentUpdater};
