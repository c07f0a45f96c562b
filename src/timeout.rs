//! Timeout utilities for external calls.
//!
//! Every probe and every label write is timeboxed so a hung replica or a
//! stuck `dfx` process cannot stall a batch.

use crate::error::{ResearchError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default probe timeout in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 30;

/// Default label write timeout in seconds
pub const DEFAULT_SINK_TIMEOUT_SECONDS: u64 = 60;

/// Timeout configuration for a single external call
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Maximum duration for the operation
    pub duration: Duration,
    /// Whether to log timeout warnings
    pub log_warnings: bool,
    /// Operation name for logging
    pub operation_name: String,
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new(seconds: u64, operation: impl Into<String>) -> Self {
        Self::from_duration(Duration::from_secs(seconds), operation)
    }

    pub fn from_duration(duration: Duration, operation: impl Into<String>) -> Self {
        Self {
            duration,
            log_warnings: true,
            operation_name: operation.into(),
        }
    }

    /// Disable the warning emitted on expiry (the caller reports it instead)
    pub fn quiet(mut self) -> Self {
        self.log_warnings = false;
        self
    }
}

/// Execute an async operation with a timeout
pub async fn with_timeout<T, F>(config: TimeoutConfig, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!(
        "Starting '{}' with timeout of {:?}",
        config.operation_name, config.duration
    );

    match timeout(config.duration, future).await {
        Ok(result) => result,
        Err(_) => {
            if config.log_warnings {
                warn!(
                    "'{}' timed out after {:?}",
                    config.operation_name, config.duration
                );
            }

            Err(ResearchError::Timeout {
                seconds: config.duration.as_secs(),
            })
        }
    }
}
