//! Checkpoint and progress management for long batches.

use super::persist::{preflight_writable, read_json_opt, write_json_atomic};
use super::result_store::{ResultStore, StorePaths};
use crate::core::{Candidate, CandidateId, ProgressState, RecordStatus};
use crate::error::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Interrupted,
}

/// Counts progress and decides when to flush.
///
/// A flush writes both result store partitions and the progress file; it is
/// the unit of crash recovery. Candidates handled after the last flush are
/// processed again on restart.
#[derive(Debug)]
pub struct ProgressTracker {
    state: RunState,
    progress: ProgressState,
    interval: usize,
    since_flush: usize,
    store_paths: StorePaths,
    progress_path: PathBuf,
}

impl ProgressTracker {
    pub fn new(store_paths: StorePaths, progress_path: impl Into<PathBuf>, interval: usize) -> Self {
        Self {
            state: RunState::Idle,
            progress: ProgressState::default(),
            interval: interval.max(1),
            since_flush: 0,
            store_paths,
            progress_path: progress_path.into(),
        }
    }

    /// Counters left by an earlier run, for reporting only.
    pub fn load_previous(path: &Path) -> Result<Option<ProgressState>> {
        read_json_opt(path)
    }

    /// Verify every output path is writable before any work starts.
    pub fn preflight(&self) -> Result<()> {
        self.store_paths.preflight()?;
        preflight_writable(&self.progress_path)
    }

    /// Enter `Running`, deriving counters from store membership.
    ///
    /// Returns the candidates still to process, in input order. Stale counters
    /// from a previous progress file are never trusted.
    pub fn start<'a>(&mut self, universe: &'a [Candidate], store: &ResultStore) -> Vec<&'a Candidate> {
        debug_assert_eq!(self.state, RunState::Idle);

        let mut pending = Vec::new();
        let mut identified = 0;
        let mut unknown = 0;
        for candidate in universe {
            match store.status_of(&candidate.id) {
                Some(RecordStatus::Identified) => identified += 1,
                Some(RecordStatus::Unknown) => unknown += 1,
                None => pending.push(candidate),
            }
        }

        self.progress = ProgressState {
            total: universe.len(),
            researched: identified + unknown,
            identified,
            unknown_documented: unknown,
            remaining: 0,
            last_candidate_id: None,
            last_updated: None,
        };
        self.progress.recompute_remaining();
        self.state = RunState::Running;
        self.since_flush = 0;
        pending
    }

    /// Count one processed candidate. Returns true when a checkpoint is due.
    pub fn record(&mut self, id: &CandidateId, status: RecordStatus) -> bool {
        debug_assert_eq!(self.state, RunState::Running);

        self.progress.researched += 1;
        match status {
            RecordStatus::Identified => self.progress.identified += 1,
            RecordStatus::Unknown => self.progress.unknown_documented += 1,
        }
        self.progress.last_candidate_id = Some(id.clone());
        self.progress.recompute_remaining();
        self.since_flush += 1;
        self.since_flush >= self.interval
    }

    /// Flush the store and the counters to disk.
    pub fn checkpoint(&mut self, store: &ResultStore) -> Result<()> {
        store.save(&self.store_paths)?;
        self.progress.last_updated = Some(Utc::now());
        write_json_atomic(&self.progress_path, &self.progress)?;
        self.since_flush = 0;
        info!(
            researched = self.progress.researched,
            total = self.progress.total,
            identified = self.progress.identified,
            unknown = self.progress.unknown_documented,
            "checkpoint saved"
        );
        Ok(())
    }

    /// Final flush, then `Completed` or `Interrupted`.
    pub fn finish(&mut self, store: &ResultStore, interrupted: bool) -> Result<()> {
        let flushed = self.checkpoint(store);
        self.state = if interrupted {
            RunState::Interrupted
        } else {
            RunState::Completed
        };
        if let Err(e) = &flushed {
            warn!(error = %e, "final flush failed");
        }
        flushed
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Candidates processed since the last flush.
    pub fn unflushed(&self) -> usize {
        self.since_flush
    }
}
