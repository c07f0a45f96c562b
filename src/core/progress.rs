//! Progress counters persisted alongside the result stores.

use super::candidate::CandidateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived batch counters, in the progress file schema.
///
/// Not authoritative: on resume these are recomputed from store membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    #[serde(rename = "total_canisters")]
    pub total: usize,
    pub researched: usize,
    pub identified: usize,
    pub unknown_documented: usize,
    pub remaining: usize,
    #[serde(rename = "last_canister_id")]
    pub last_candidate_id: Option<CandidateId>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProgressState {
    pub fn recompute_remaining(&mut self) {
        self.remaining = self.total.saturating_sub(self.researched);
    }
}
