//! Durable result stores and checkpointing.
//!
//! Result store files are the source of truth for "already processed";
//! the progress file only mirrors counters derived from them.

pub mod persist;
pub mod progress;
pub mod result_store;

pub use progress::{ProgressTracker, RunState};
pub use result_store::{ResultStore, StorePaths};
