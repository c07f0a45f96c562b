use super::{Pacer, Prober};
use crate::core::{CandidateId, EvidenceBundle, ProbeOutcome, TokenIdentity};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Runs the probes for one candidate in their required order.
///
/// 1. descriptor, truncated to `descriptor_limit` characters
/// 2. token name, then symbol (the symbol call is skipped when no name came back)
/// 3. ledger reference, followed by a token probe of the referenced ledger
///
/// The index probe is skipped for canisters that already proved to be
/// tokens, since the classifier decides on the token stage before it.
/// No outcome here is fatal; failures only leave fields unset.
pub struct EvidenceCollector<P> {
    prober: P,
    pacer: Arc<Pacer>,
    descriptor_limit: usize,
}

impl<P: Prober> EvidenceCollector<P> {
    pub fn new(prober: P, pacer: Arc<Pacer>, descriptor_limit: usize) -> Self {
        Self {
            prober,
            pacer,
            descriptor_limit,
        }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    pub async fn collect(&self, id: &CandidateId) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::default();

        self.pacer.wait().await;
        let descriptor = self.prober.descriptor(id).await.non_blank();
        log_outcome("descriptor", id, &descriptor);
        if let ProbeOutcome::Success(text) = descriptor {
            bundle.set_descriptor(&text, self.descriptor_limit);
        }

        let (name, symbol) = self.token_probe(id).await;
        bundle.set_token(name, symbol);
        if bundle.is_token {
            return bundle;
        }

        self.pacer.wait().await;
        let ledger = self.prober.ledger_reference(id).await;
        log_outcome("ledger_id", id, &ledger);
        if let ProbeOutcome::Success(ledger) = ledger {
            // one level only: the referenced ledger gets a token probe, nothing more
            if &ledger != id {
                if let (Some(name), Some(symbol)) = self.token_probe(&ledger).await {
                    bundle.ledger_token = Some(TokenIdentity { name, symbol });
                }
            }
            bundle.ledger_reference = Some(ledger);
        }

        bundle
    }

    async fn token_probe(&self, id: &CandidateId) -> (Option<String>, Option<String>) {
        self.pacer.wait().await;
        let name = self.prober.token_name(id).await.non_blank();
        log_outcome("icrc1_name", id, &name);
        let Some(name) = name.value() else {
            return (None, None);
        };

        self.pacer.wait().await;
        let symbol = self.prober.token_symbol(id).await.non_blank();
        log_outcome("icrc1_symbol", id, &symbol);
        (Some(name), symbol.value())
    }
}

fn log_outcome<T: Debug>(probe: &str, id: &CandidateId, outcome: &ProbeOutcome<T>) {
    match outcome {
        ProbeOutcome::Failure(reason) => {
            debug!(probe, canister = %id, %reason, "probe failed")
        }
        other => debug!(probe, canister = %id, outcome = other.kind(), "probe answered"),
    }
}
