//! Evidence-driven identification of unlabeled Internet Computer canisters.
//!
//! Candidates are probed read-only for interface evidence, classified by an
//! ordered rule table, and recorded in durable result stores that survive
//! interrupted runs. Stores from separate runs merge into one view that
//! re-seeds future batches.

/// Sequential checkpointed batch loop
pub mod batch;
/// Staged classification rules
pub mod classify;
/// Configuration
pub mod config;
/// Core data types module
pub mod core;
/// Error types
pub mod error;
/// Tracing setup
pub mod logging;
/// Read-only evidence probes
pub mod probe;
/// Merging of result stores
pub mod reconcile;
/// External label registry
pub mod sink;
/// Result stores and progress files
pub mod store;
/// Timeout utilities
pub mod timeout;

pub use batch::{BatchRunner, BatchSummary, Shutdown};
pub use classify::{Classifier, RuleTable};
pub use config::ResearchConfig;
pub use error::{ResearchError, Result};
