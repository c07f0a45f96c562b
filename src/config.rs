//! Configuration for the research pipeline.
//!
//! Provides centralized configuration for every component with sensible
//! defaults. A TOML file may override any subset of fields; command line
//! flags override the file.

use crate::classify::RuleTable;
use crate::error::{ResearchError, Result};
use crate::timeout::{DEFAULT_PROBE_TIMEOUT_SECONDS, DEFAULT_SINK_TIMEOUT_SECONDS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Master configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Probe transport and evidence limits.
    pub probe: ProbeConfig,
    /// Batch loop and checkpoint cadence.
    pub batch: BatchConfig,
    /// Label sink target and retry policy.
    pub sink: SinkConfig,
    /// Ordered classification rules.
    pub rules: RuleTable,
}

impl ResearchConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ResearchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ResearchError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.timeout_secs == 0 {
            return Err(ResearchError::Config("probe.timeout_secs must be > 0".into()));
        }
        if self.probe.descriptor_limit == 0 {
            return Err(ResearchError::Config(
                "probe.descriptor_limit must be > 0".into(),
            ));
        }
        if self.batch.checkpoint_interval == 0 {
            return Err(ResearchError::Config(
                "batch.checkpoint_interval must be > 0".into(),
            ));
        }
        if self.sink.timeout_secs == 0 {
            return Err(ResearchError::Config("sink.timeout_secs must be > 0".into()));
        }
        if self.sink.max_attempts == 0 {
            return Err(ResearchError::Config("sink.max_attempts must be > 0".into()));
        }
        self.rules.validate()
    }
}

/// Probe transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Path or name of the `dfx` executable.
    pub dfx_binary: String,
    /// Network passed to `dfx --network`.
    pub network: String,
    /// Timebox for each probe call.
    pub timeout_secs: u64,
    /// Fixed pause between consecutive external calls.
    pub call_delay_ms: u64,
    /// Characters of descriptor text kept as evidence.
    pub descriptor_limit: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            dfx_binary: "dfx".to_string(),
            network: "ic".to_string(),
            timeout_secs: DEFAULT_PROBE_TIMEOUT_SECONDS,
            call_delay_ms: 500,
            descriptor_limit: 500,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn call_delay(&self) -> Duration {
        Duration::from_millis(self.call_delay_ms)
    }
}

/// Batch loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Candidates processed between durable flushes.
    pub checkpoint_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 10,
        }
    }
}

/// Label sink configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Registry canister receiving labels; no writes happen when unset.
    pub backend_canister: Option<String>,
    /// Update method taking `(principal, opt text)`.
    pub method: String,
    /// Timebox for each label write.
    pub timeout_secs: u64,
    /// Attempts per label; 1 keeps writes best-effort.
    pub max_attempts: u32,
    /// Backoff before the first retry, doubled per attempt.
    pub retry_backoff_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend_canister: None,
            method: "set_project".to_string(),
            timeout_secs: DEFAULT_SINK_TIMEOUT_SECONDS,
            max_attempts: 1,
            retry_backoff_ms: 1000,
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
