//! Error types for the canister research pipeline.
//!
//! Only conditions that stop an operation outright are errors here. A probe
//! that times out or returns nothing is evidence, not an error, and is carried
//! as a [`crate::core::evidence::ProbeOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for research operations.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The input candidate list could not be read or parsed
    #[error("Cannot load candidate list {path:?}: {message}")]
    CandidateList { path: PathBuf, message: String },

    /// A result store or progress file could not be loaded or written
    #[error("Store error at {path:?}: {message}")]
    Store { path: PathBuf, message: String },

    /// A record violates the identified/unknown invariant
    #[error("Invalid record for {id}: {message}")]
    InvalidRecord { id: String, message: String },

    /// External call timeout
    #[error("External call timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// External command could not be spawned or awaited
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResearchError {
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;
