//! Classification outcomes and the persisted research record.
//!
//! Category strings outside the known set (older stores carry values such
//! as `"Unidentified (no candid)"`) load as [`Category::Other`] and are
//! written back as `"other"` on the next save.

use super::candidate::{Candidate, CandidateId};
use super::evidence::EvidenceBundle;
use crate::error::{ResearchError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse project category of an identified canister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Token,
    NnsInfrastructure,
    Infrastructure,
    Defi,
    Nft,
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Token => "token",
            Category::NnsInfrastructure => "nns_infrastructure",
            Category::Infrastructure => "infrastructure",
            Category::Defi => "defi",
            Category::Nft => "nft",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documented reason a canister could not be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownReason {
    /// Token interface answered but no symbol pattern matched
    TokenUnknownProject,
    /// `ledger_id` answered but the ledger is not a token
    #[serde(alias = "index_ledger_unknown")]
    IndexUnresolved,
    /// Descriptor present but no rule reached its marker threshold
    #[serde(alias = "candid_unrecognizable")]
    DescriptorUnrecognized,
    /// No descriptor, no token, no index evidence
    #[serde(alias = "no_candid_metadata")]
    NoDescriptor,
}

impl UnknownReason {
    pub const ALL: [UnknownReason; 4] = [
        UnknownReason::TokenUnknownProject,
        UnknownReason::IndexUnresolved,
        UnknownReason::DescriptorUnrecognized,
        UnknownReason::NoDescriptor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnknownReason::TokenUnknownProject => "token_unknown_project",
            UnknownReason::IndexUnresolved => "index_unresolved",
            UnknownReason::DescriptorUnrecognized => "descriptor_unrecognized",
            UnknownReason::NoDescriptor => "no_descriptor",
        }
    }
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal decision of the classifier for one evidence bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Identified {
        project: String,
        category: Category,
        notes: String,
    },
    Unknown {
        reason: UnknownReason,
        notes: String,
    },
}

impl Classification {
    pub fn project(&self) -> Option<&str> {
        match self {
            Classification::Identified { project, .. } => Some(project),
            Classification::Unknown { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<UnknownReason> {
        match self {
            Classification::Identified { .. } => None,
            Classification::Unknown { reason, .. } => Some(*reason),
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, Classification::Identified { .. })
    }
}

/// Which partition of a result store a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Identified,
    Unknown,
}

/// One persisted classification result, in the result store file schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub canister_id: CandidateId,
    pub project: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub reason: Option<UnknownReason>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_token: bool,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub ledger_id: Option<CandidateId>,
    #[serde(default)]
    pub last_researched: NaiveDate,
    #[serde(default, alias = "burn_rank", skip_serializing_if = "Option::is_none")]
    pub priority_rank: Option<u32>,
    /// Bounded descriptor prefix kept for later reclassification
    #[serde(
        default,
        alias = "candid_summary",
        skip_serializing_if = "Option::is_none"
    )]
    pub descriptor_excerpt: Option<String>,
}

impl ResearchRecord {
    /// Build the record for a classified candidate, preserving its evidence.
    pub fn from_classification(
        candidate: &Candidate,
        evidence: &EvidenceBundle,
        classification: Classification,
        observed_on: NaiveDate,
    ) -> Self {
        let (project, category, reason, notes) = match classification {
            Classification::Identified {
                project,
                category,
                notes,
            } => (Some(project), Some(category), None, notes),
            Classification::Unknown { reason, notes } => (None, None, Some(reason), notes),
        };

        Self {
            canister_id: candidate.id.clone(),
            project,
            category,
            reason,
            notes,
            is_token: evidence.is_token,
            token_name: evidence.token_name.clone(),
            token_symbol: evidence.token_symbol.clone(),
            ledger_id: evidence.ledger_reference.clone(),
            last_researched: observed_on,
            priority_rank: Some(candidate.priority_rank),
            descriptor_excerpt: evidence.descriptor_text.clone(),
        }
    }

    /// Partition this record belongs to; errors when the invariant is broken.
    ///
    /// Exactly one of a non-blank `project` or a `reason` must be set.
    pub fn status(&self) -> Result<RecordStatus> {
        let has_project = self
            .project
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        match (has_project, self.reason.is_some()) {
            (true, false) => Ok(RecordStatus::Identified),
            (false, true) => Ok(RecordStatus::Unknown),
            (true, true) => Err(self.invalid("both project and reason are set")),
            (false, false) => Err(self.invalid("neither project nor reason is set")),
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self.status(), Ok(RecordStatus::Identified))
    }

    /// Rebuild the evidence this record preserved, for a reclassification pass.
    pub fn evidence(&self) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::default();
        if let Some(text) = &self.descriptor_excerpt {
            // already bounded when it was stored
            bundle.set_descriptor(text, usize::MAX);
        }
        bundle.set_token(self.token_name.clone(), self.token_symbol.clone());
        bundle.is_token = self.is_token && bundle.is_token;
        bundle.ledger_reference = self.ledger_id.clone();
        bundle
    }

    /// Replace the outcome with an identification, keeping the evidence fields.
    pub fn promote(&mut self, classification: Classification, observed_on: NaiveDate) {
        if let Classification::Identified {
            project,
            category,
            notes,
        } = classification
        {
            self.project = Some(project);
            self.category = Some(category);
            self.reason = None;
            self.notes = notes;
            self.last_researched = observed_on;
        }
    }

    fn invalid(&self, message: &str) -> ResearchError {
        ResearchError::InvalidRecord {
            id: self.canister_id.to_string(),
            message: message.to_string(),
        }
    }
}
