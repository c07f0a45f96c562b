//! Core data types for canister research.
//!
//! Candidates, the evidence gathered about them, the persisted research
//! record and the progress counters. Everything else in the crate is built
//! on these.

pub mod candidate;
pub mod evidence;
pub mod progress;
pub mod record;

pub use candidate::{load_candidates, parse_candidates, Candidate, CandidateId};
pub use evidence::{EvidenceBundle, ProbeFailure, ProbeOutcome, TokenIdentity};
pub use progress::ProgressState;
pub use record::{Category, Classification, RecordStatus, ResearchRecord, UnknownReason};
