//! Read-only evidence probes.
//!
//! A [`Prober`] answers the four probe questions for a canister; the
//! [`EvidenceCollector`] runs them in the fixed order, paced and timeboxed,
//! and folds the outcomes into an evidence bundle.

pub mod collector;
pub mod dfx;
pub mod pacer;

use crate::core::{CandidateId, ProbeOutcome};
use std::future::Future;

pub use collector::EvidenceCollector;
pub use dfx::{DfxClient, DfxProber};
pub use pacer::Pacer;

/// Transport-agnostic probe protocol.
///
/// Implementations must never mutate canister state and must tell a failed
/// call (`Failure`) apart from a call that answered with nothing (`Empty`).
pub trait Prober {
    /// Interface descriptor text (`candid:service` metadata).
    fn descriptor(&self, id: &CandidateId) -> impl Future<Output = ProbeOutcome<String>>;

    /// `icrc1_name` of the canister.
    fn token_name(&self, id: &CandidateId) -> impl Future<Output = ProbeOutcome<String>>;

    /// `icrc1_symbol` of the canister.
    fn token_symbol(&self, id: &CandidateId) -> impl Future<Output = ProbeOutcome<String>>;

    /// `ledger_id` of an index canister.
    fn ledger_reference(&self, id: &CandidateId)
        -> impl Future<Output = ProbeOutcome<CandidateId>>;
}
