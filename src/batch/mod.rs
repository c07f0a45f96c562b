//! Sequential, checkpointed research batch.

use crate::classify::Classifier;
use crate::core::{Candidate, Classification, ProgressState, RecordStatus, ResearchRecord};
use crate::error::Result;
use crate::probe::{EvidenceCollector, Prober};
use crate::sink::LabelSink;
use crate::store::{ProgressTracker, ResultStore};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Cloneable interrupt handle shared between a signal listener and the runner.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// What a run did, reported once it stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub run_id: Uuid,
    /// Candidates already present in the store at start.
    pub skipped: usize,
    /// Candidates classified by this run.
    pub processed: usize,
    pub identified: usize,
    pub unknown: usize,
    pub sink_failures: usize,
    /// Records refused by the store; left pending for a later run.
    pub rejected: usize,
    pub interrupted: bool,
    /// Counters as of the final flush.
    pub progress: ProgressState,
}

/// Drives candidates through evidence collection, classification and storage.
pub struct BatchRunner<P, S> {
    collector: EvidenceCollector<P>,
    classifier: Classifier,
    sink: Option<S>,
    shutdown: Shutdown,
    observed_on: NaiveDate,
}

impl<P: Prober, S: LabelSink> BatchRunner<P, S> {
    pub fn new(collector: EvidenceCollector<P>, classifier: Classifier, sink: Option<S>) -> Self {
        Self {
            collector,
            classifier,
            sink,
            shutdown: Shutdown::new(),
            observed_on: Utc::now().date_naive(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Date stamped on every record written by this run.
    pub fn with_observed_on(mut self, date: NaiveDate) -> Self {
        self.observed_on = date;
        self
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn collector(&self) -> &EvidenceCollector<P> {
        &self.collector
    }

    /// Process every candidate of `universe` not yet in `store`, in input order.
    ///
    /// Output paths are preflighted before the first candidate; a failure
    /// there aborts with nothing written. Both stores and the progress file
    /// are flushed every checkpoint interval and once more when the run
    /// completes or is interrupted.
    pub async fn run(
        &self,
        universe: &[Candidate],
        store: &mut ResultStore,
        tracker: &mut ProgressTracker,
    ) -> Result<BatchSummary> {
        tracker.preflight()?;
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, universe, store, tracker)
            .instrument(info_span!("batch", %run_id))
            .await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        universe: &[Candidate],
        store: &mut ResultStore,
        tracker: &mut ProgressTracker,
    ) -> Result<BatchSummary> {
        let pending = tracker.start(universe, store);
        let mut summary = BatchSummary {
            run_id,
            skipped: universe.len() - pending.len(),
            processed: 0,
            identified: 0,
            unknown: 0,
            sink_failures: 0,
            rejected: 0,
            interrupted: false,
            progress: tracker.progress().clone(),
        };
        info!(
            total = universe.len(),
            skipped = summary.skipped,
            pending = pending.len(),
            "batch started"
        );

        for candidate in pending {
            if self.shutdown.is_triggered() {
                summary.interrupted = true;
                break;
            }

            let span = info_span!("candidate", canister = %candidate.id, rank = candidate.priority_rank);
            let Some(record) = self.research(candidate).instrument(span.clone()).await else {
                summary.interrupted = true;
                break;
            };

            let label = record.project.clone();
            let status = match store.insert(record) {
                Ok(status) => status,
                Err(err) => {
                    span.in_scope(|| warn!(error = %err, "record rejected; candidate left pending"));
                    summary.rejected += 1;
                    continue;
                }
            };
            summary.processed += 1;
            match status {
                RecordStatus::Identified => {
                    summary.identified += 1;
                    if !self.push_label(candidate, label.as_deref()).instrument(span).await {
                        summary.sink_failures += 1;
                    }
                }
                RecordStatus::Unknown => summary.unknown += 1,
            }

            if tracker.record(&candidate.id, status) {
                tracker.checkpoint(store)?;
            }
        }

        if !summary.interrupted && self.shutdown.is_triggered() {
            summary.interrupted = true;
        }
        tracker.finish(store, summary.interrupted)?;
        summary.progress = tracker.progress().clone();

        if summary.interrupted {
            warn!(
                processed = summary.processed,
                researched = summary.progress.researched,
                remaining = summary.progress.remaining,
                "batch interrupted; progress saved"
            );
        } else {
            info!(
                processed = summary.processed,
                identified = summary.identified,
                unknown = summary.unknown,
                sink_failures = summary.sink_failures,
                rejected = summary.rejected,
                "batch complete"
            );
        }
        Ok(summary)
    }

    /// Collect and classify one candidate. `None` when interrupted mid-probe;
    /// the in-flight probe is dropped.
    async fn research(&self, candidate: &Candidate) -> Option<ResearchRecord> {
        let evidence = tokio::select! {
            biased;
            _ = self.shutdown.wait() => return None,
            evidence = self.collector.collect(&candidate.id) => evidence,
        };

        let verdict = self.classifier.classify(&evidence);
        match &verdict {
            Classification::Identified {
                project, category, ..
            } => info!(%project, %category, "identified"),
            Classification::Unknown { reason, .. } => info!(%reason, "unknown"),
        }
        Some(ResearchRecord::from_classification(
            candidate,
            &evidence,
            verdict,
            self.observed_on,
        ))
    }

    /// Best-effort label write. Returns false only when a configured sink failed.
    async fn push_label(&self, candidate: &Candidate, label: Option<&str>) -> bool {
        let (Some(sink), Some(label)) = (&self.sink, label) else {
            return true;
        };
        let written = tokio::select! {
            biased;
            _ = self.shutdown.wait() => {
                warn!("label write abandoned on interrupt; record kept for re-sync");
                return false;
            }
            written = sink.set_label(&candidate.id, Some(label)) => written,
        };
        if !written {
            warn!("label not written; record kept for re-sync");
        }
        written
    }
}
