//! Probe outcomes and the evidence bundle handed to the classifier.

use super::candidate::CandidateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a probe produced no usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeFailure {
    /// The call did not complete within its timebox
    Timeout { seconds: u64 },
    /// Spawn failure, non-zero exit or replica rejection
    Transport(String),
    /// The call completed but its reply could not be parsed
    Malformed(String),
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeFailure::Timeout { seconds } => write!(f, "timeout after {seconds}s"),
            ProbeFailure::Transport(msg) => write!(f, "transport: {msg}"),
            ProbeFailure::Malformed(msg) => write!(f, "malformed reply: {msg}"),
        }
    }
}

/// Uniform result of every read-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome<T> {
    Success(T),
    Empty,
    Failure(ProbeFailure),
}

impl<T> ProbeOutcome<T> {
    pub fn value(self) -> Option<T> {
        match self {
            ProbeOutcome::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            ProbeOutcome::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProbeOutcome::Failure(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProbeOutcome<U> {
        match self {
            ProbeOutcome::Success(v) => ProbeOutcome::Success(f(v)),
            ProbeOutcome::Empty => ProbeOutcome::Empty,
            ProbeOutcome::Failure(e) => ProbeOutcome::Failure(e),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeOutcome::Success(_) => "value",
            ProbeOutcome::Empty => "empty",
            ProbeOutcome::Failure(_) => "failed",
        }
    }
}

impl ProbeOutcome<String> {
    /// Blank strings count as an empty answer.
    pub fn non_blank(self) -> Self {
        match self {
            ProbeOutcome::Success(s) if s.trim().is_empty() => ProbeOutcome::Empty,
            other => other,
        }
    }
}

/// Name and symbol of a token ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub name: String,
    pub symbol: String,
}

/// Everything learned about one candidate during one run.
///
/// Never persisted on its own: the relevant fields are copied into the
/// research record produced by classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceBundle {
    pub descriptor_available: bool,
    /// Bounded prefix of the interface descriptor
    pub descriptor_text: Option<String>,
    pub is_token: bool,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub ledger_reference: Option<CandidateId>,
    /// Token identity of `ledger_reference`, when that ledger answered the token probe
    pub ledger_token: Option<TokenIdentity>,
}

impl EvidenceBundle {
    /// Record a descriptor, truncated to at most `limit` characters.
    pub fn set_descriptor(&mut self, text: &str, limit: usize) {
        self.descriptor_available = true;
        self.descriptor_text = Some(truncate_chars(text, limit));
    }

    /// Record a token identity; both halves must be non-empty.
    pub fn set_token(&mut self, name: Option<String>, symbol: Option<String>) {
        self.is_token = matches!((&name, &symbol), (Some(n), Some(s)) if !n.is_empty() && !s.is_empty());
        self.token_name = name;
        self.token_symbol = symbol;
    }

    /// Symbol of the referenced ledger, if it resolved to a token.
    pub fn ledger_symbol(&self) -> Option<&str> {
        self.ledger_token.as_ref().map(|t| t.symbol.as_str())
    }
}

/// Character-boundary-safe prefix.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
