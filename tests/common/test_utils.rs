//! Shared helpers for building throwaway workspaces.

use canister_research::core::{Candidate, ResearchRecord};
use canister_research::store::{ProgressTracker, StorePaths};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Store, progress and candidate paths inside one temporary directory.
pub struct Workspace {
    pub dir: TempDir,
    pub paths: StorePaths,
    pub progress: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        let paths = StorePaths::new(
            dir.path().join("data/research_results.json"),
            dir.path().join("data/research_results_unknown.json"),
        );
        let progress = dir.path().join("data/research_progress.json");
        Self {
            dir,
            paths,
            progress,
        }
    }

    pub fn tracker(&self, interval: usize) -> ProgressTracker {
        ProgressTracker::new(self.paths.clone(), &self.progress, interval)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn read_records(path: &Path) -> Vec<ResearchRecord> {
        let text = std::fs::read_to_string(path).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

/// Candidates ranked by their position.
pub fn candidates(ids: &[&str]) -> Vec<Candidate> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| Candidate::new(*id, i as u32 + 1))
        .collect()
}

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
}

/// Descriptor text of a frontend asset canister.
pub const ASSET_DESCRIPTOR: &str = "type BatchId = nat;\nservice : {\n  create_batch : (record {}) -> (record { batch_id : BatchId });\n  create_asset : (CreateAssetArguments) -> ();\n}";

/// Descriptor text no rule recognizes.
pub const OPAQUE_DESCRIPTOR: &str = "service : { greet : (text) -> (text) query }";
