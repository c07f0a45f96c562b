//! Candidate identifiers and candidate list loading.

use crate::error::{ResearchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Textual principal of a canister, e.g. `ryjl3-tyaaa-aaaaa-aaaba-cai`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An actor awaiting identification. Immutable once loaded for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub priority_rank: u32,
}

impl Candidate {
    pub fn new(id: impl Into<String>, priority_rank: u32) -> Self {
        Self {
            id: CandidateId::new(id),
            priority_rank,
        }
    }
}

// Lists come from several generations of tooling: `{id, priority_rank}`,
// leaderboard exports with `canister_id`/`burn_rank`, or bare id strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateEntry {
    Bare(String),
    Record {
        #[serde(alias = "canister_id")]
        id: String,
        #[serde(default, alias = "burn_rank")]
        priority_rank: Option<u32>,
    },
}

/// Parse a candidate list from JSON.
///
/// Missing ranks default to the 1-based list position. Duplicate ids keep
/// their first occurrence so input order stays the processing order.
pub fn parse_candidates(json: &str) -> std::result::Result<Vec<Candidate>, serde_json::Error> {
    let entries: Vec<CandidateEntry> = serde_json::from_str(json)?;
    let mut seen = HashSet::with_capacity(entries.len());
    let mut out = Vec::with_capacity(entries.len());

    for (position, entry) in entries.into_iter().enumerate() {
        let (id, rank) = match entry {
            CandidateEntry::Bare(id) => (id, None),
            CandidateEntry::Record { id, priority_rank } => (id, priority_rank),
        };
        let id = id.trim().to_string();
        if id.is_empty() || !seen.insert(id.clone()) {
            continue;
        }
        let rank = rank.unwrap_or_else(|| u32::try_from(position + 1).unwrap_or(u32::MAX));
        out.push(Candidate::new(id, rank));
    }

    Ok(out)
}

/// Load a candidate list from disk. Any failure here is fatal for a run.
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let text = std::fs::read_to_string(path).map_err(|e| ResearchError::CandidateList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse_candidates(&text).map_err(|e| ResearchError::CandidateList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
