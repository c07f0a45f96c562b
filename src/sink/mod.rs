//! Best-effort label writes to an external registry.
//!
//! A sink call never fails the batch: every implementation reports plain
//! success or failure and logs the reason itself.

use crate::core::{CandidateId, ResearchRecord};
use crate::probe::{DfxClient, Pacer};
use crate::store::ResultStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `setLabel(candidate_id, label) -> success`.
///
/// The remote side treats repeated writes of the same label as no-ops.
pub trait LabelSink {
    fn set_label(&self, id: &CandidateId, label: Option<&str>) -> impl Future<Output = bool>;
}

/// Writes labels with `dfx canister call <backend> <method> '(principal "..", opt "..")'`.
#[derive(Debug, Clone)]
pub struct DfxLabelSink {
    client: DfxClient,
    backend: String,
    method: String,
    timeout: Duration,
    pacer: Arc<Pacer>,
}

impl DfxLabelSink {
    pub fn new(
        client: DfxClient,
        backend: impl Into<String>,
        method: impl Into<String>,
        timeout: Duration,
        pacer: Arc<Pacer>,
    ) -> Self {
        Self {
            client,
            backend: backend.into(),
            method: method.into(),
            timeout,
            pacer,
        }
    }
}

impl LabelSink for DfxLabelSink {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        self.pacer.wait().await;
        let args = label_args(id, label);
        match self
            .client
            .call(&self.backend, &self.method, &args, self.timeout)
            .await
        {
            Ok(out) if out.success => {
                debug!(canister = %id, backend = %self.backend, "label written");
                true
            }
            Ok(out) => {
                warn!(canister = %id, stderr = %out.stderr.trim(), "label write rejected");
                false
            }
            Err(e) => {
                warn!(canister = %id, error = %e, "label write failed");
                false
            }
        }
    }
}

/// Candid argument tuple for a label write.
pub fn label_args(id: &CandidateId, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("(principal \"{id}\", opt \"{}\")", escape_candid_text(label)),
        None => format!("(principal \"{id}\", null)"),
    }
}

/// Escape text for a Candid string literal.
pub fn escape_candid_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Logs what would be written and always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSink;

impl LabelSink for DryRunSink {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        info!(canister = %id, label = label.unwrap_or("<none>"), "dry run: label not written");
        true
    }
}

/// Retries a sink with doubling backoff.
///
/// Opt-in: one attempt keeps the best-effort contract of a bare sink.
#[derive(Debug, Clone)]
pub struct RetryingSink<S> {
    inner: S,
    max_attempts: u32,
    backoff: Duration,
}

impl<S: LabelSink> RetryingSink<S> {
    pub fn new(inner: S, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LabelSink> LabelSink for RetryingSink<S> {
    async fn set_label(&self, id: &CandidateId, label: Option<&str>) -> bool {
        let mut delay = self.backoff;
        for attempt in 1..=self.max_attempts {
            if self.inner.set_label(id, label).await {
                return true;
            }
            if attempt < self.max_attempts {
                debug!(canister = %id, attempt, ?delay, "retrying label write");
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        warn!(canister = %id, attempts = self.max_attempts, "label write gave up");
        false
    }
}

/// Counts from a re-sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Push the label of one record; Unknown records are never written.
///
/// Returns `None` when the record carries no label.
pub async fn push_record<S: LabelSink>(sink: &S, record: &ResearchRecord) -> Option<bool> {
    let label = record.project.as_deref().filter(|p| !p.trim().is_empty())?;
    Some(sink.set_label(&record.canister_id, Some(label)).await)
}

/// Re-send every Identified record of `store`.
pub async fn resync<S: LabelSink>(store: &ResultStore, sink: &S) -> SyncReport {
    let mut report = SyncReport::default();
    for record in store.identified() {
        match push_record(sink, record).await {
            Some(true) => report.succeeded += 1,
            Some(false) => report.failed += 1,
            None => report.skipped += 1,
        }
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        "re-sync finished"
    );
    report
}
