//! Common test utilities and helpers.
//!
//! In-memory stand-ins for the external systems: a scripted prober and a
//! recording label sink.

#![allow(dead_code)]

pub mod test_utils;

use canister_research::core::{CandidateId, ProbeFailure, ProbeOutcome};
use canister_research::probe::{EvidenceCollector, Pacer, Prober};
use canister_research::sink::LabelSink;
use canister_research::{BatchRunner, Classifier, Shutdown};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Unpaced runner over a fake prober with the default rule table.
pub fn runner(
    prober: FakeProber,
    sink: Option<&RecordingSink>,
) -> BatchRunner<FakeProber, &RecordingSink> {
    let collector = EvidenceCollector::new(prober, Arc::new(Pacer::unpaced()), 500);
    BatchRunner::new(collector, Classifier::default(), sink).with_observed_on(test_utils::run_date())
}

/// What one fake canister answers.
#[derive(Debug, Clone, Default)]
pub struct FakeCanister {
    pub descriptor: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub ledger: Option<String>,
    pub unreachable: bool,
}

/// Scripted prober; unknown ids answer `Empty` to everything.
#[derive(Default)]
pub struct FakeProber {
    canisters: HashMap<String, FakeCanister>,
    interrupt_on: Option<(String, Shutdown)>,
    snapshot_on: Option<(String, PathBuf)>,
    snapshot: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, id: &str) -> &mut FakeCanister {
        self.canisters.entry(id.to_string()).or_default()
    }

    pub fn token(mut self, id: &str, name: &str, symbol: &str) -> Self {
        let c = self.entry(id);
        c.name = Some(name.to_string());
        c.symbol = Some(symbol.to_string());
        self
    }

    pub fn descriptor(mut self, id: &str, text: &str) -> Self {
        self.entry(id).descriptor = Some(text.to_string());
        self
    }

    pub fn index(mut self, id: &str, ledger: &str) -> Self {
        self.entry(id).ledger = Some(ledger.to_string());
        self
    }

    /// Every probe of `id` fails at the transport level.
    pub fn unreachable(mut self, id: &str) -> Self {
        self.entry(id).unreachable = true;
        self
    }

    /// Trigger `shutdown` from inside the descriptor probe of `id`, then hang.
    pub fn interrupt_on(mut self, id: &str, shutdown: Shutdown) -> Self {
        self.interrupt_on = Some((id.to_string(), shutdown));
        self
    }

    /// Read `path` when the descriptor probe of `id` starts.
    pub fn snapshot_on(mut self, id: &str, path: impl Into<PathBuf>) -> Self {
        self.snapshot_on = Some((id.to_string(), path.into()));
        self
    }

    /// Contents captured by [`snapshot_on`](Self::snapshot_on); `None` if
    /// the file did not exist yet or the probe never ran.
    pub fn snapshot(&self) -> Option<String> {
        self.snapshot.lock().unwrap().clone()
    }

    /// Ids whose descriptor was probed, in call order.
    pub fn probed(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.strip_prefix("descriptor ").map(str::to_string))
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, probe: &str, id: &CandidateId) -> Option<&FakeCanister> {
        self.calls.lock().unwrap().push(format!("{probe} {id}"));
        self.canisters.get(id.as_str())
    }

    fn text(canister: Option<&FakeCanister>, pick: fn(&FakeCanister) -> &Option<String>) -> ProbeOutcome<String> {
        match canister {
            Some(c) if c.unreachable => {
                ProbeOutcome::Failure(ProbeFailure::Transport("connection refused".into()))
            }
            Some(c) => pick(c)
                .clone()
                .map_or(ProbeOutcome::Empty, ProbeOutcome::Success),
            None => ProbeOutcome::Empty,
        }
    }
}

impl Prober for FakeProber {
    async fn descriptor(&self, id: &CandidateId) -> ProbeOutcome<String> {
        let canister = self.log("descriptor", id);
        if let Some((target, path)) = &self.snapshot_on {
            if target == id.as_str() {
                *self.snapshot.lock().unwrap() = std::fs::read_to_string(path).ok();
            }
        }
        if let Some((target, shutdown)) = &self.interrupt_on {
            if target == id.as_str() {
                shutdown.trigger();
                std::future::pending::<()>().await;
            }
        }
        Self::text(canister, |c| &c.descriptor)
    }

    async fn token_name(&self, id: &CandidateId) -> ProbeOutcome<String> {
        Self::text(self.log("name", id), |c| &c.name)
    }

    async fn token_symbol(&self, id: &CandidateId) -> ProbeOutcome<String> {
        Self::text(self.log("symbol", id), |c| &c.symbol)
    }

    async fn ledger_reference(&self, id: &CandidateId) -> ProbeOutcome<CandidateId> {
        Self::text(self.log("ledger", id), |c| &c.ledger).map(CandidateId::new)
    }
}

/// Label sink that remembers every write.
#[derive(Default)]
pub struct RecordingSink {
    failing: HashSet<String>,
    writes: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes for `id` report failure.
    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn writes(&self) -> Vec<(String, Option<String>)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<(String, String)> {
        self.writes()
            .into_iter()
            .filter_map(|(id, label)| label.map(|l| (id, l)))
            .collect()
    }
}

impl LabelSink for RecordingSink {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        self.writes
            .lock()
            .unwrap()
            .push((id.to_string(), label.map(str::to_string)));
        !self.failing.contains(id.as_str())
    }
}

impl LabelSink for &RecordingSink {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        (**self).set_label(id, label).await
    }
}
