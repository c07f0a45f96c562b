//! Identified/Unknown partitioned result store.

use super::persist::{preflight_writable, read_json_opt, write_json_atomic};
use crate::core::{CandidateId, Classification, RecordStatus, ResearchRecord};
use crate::error::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File locations of one result store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub identified: PathBuf,
    pub unknown: PathBuf,
}

impl StorePaths {
    pub fn new(identified: impl Into<PathBuf>, unknown: impl Into<PathBuf>) -> Self {
        Self {
            identified: identified.into(),
            unknown: unknown.into(),
        }
    }

    pub fn preflight(&self) -> Result<()> {
        preflight_writable(&self.identified)?;
        preflight_writable(&self.unknown)
    }
}

/// Ordered classification results, physically split into Identified and Unknown.
///
/// At most one record per candidate id. Within a run the store only grows;
/// the one exception is promotion, which moves an id from Unknown to
/// Identified. An Identified record is never replaced by an Unknown one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultStore {
    identified: Vec<ResearchRecord>,
    unknown: Vec<ResearchRecord>,
    members: HashMap<CandidateId, RecordStatus>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records in any order, routing each by its status.
    pub fn from_records(records: impl IntoIterator<Item = ResearchRecord>) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            store.insert(record)?;
        }
        Ok(store)
    }

    /// Load both files; absent files are empty partitions.
    pub fn load(paths: &StorePaths) -> Result<Self> {
        let identified: Vec<ResearchRecord> = read_json_opt(&paths.identified)?.unwrap_or_default();
        let unknown: Vec<ResearchRecord> = read_json_opt(&paths.unknown)?.unwrap_or_default();
        debug!(
            identified = identified.len(),
            unknown = unknown.len(),
            "loaded result store"
        );
        Self::from_records(identified.into_iter().chain(unknown))
    }

    /// Load a single file of mixed records.
    pub fn load_file(path: &Path) -> Result<Self> {
        let records: Vec<ResearchRecord> = read_json_opt(path)?.unwrap_or_default();
        Self::from_records(records)
    }

    pub fn save(&self, paths: &StorePaths) -> Result<()> {
        write_json_atomic(&paths.identified, &self.identified)?;
        write_json_atomic(&paths.unknown, &self.unknown)
    }

    /// Add or update a record.
    ///
    /// Returns the partition the id ends up in. An Unknown record for an id
    /// that is already Identified is ignored.
    pub fn insert(&mut self, record: ResearchRecord) -> Result<RecordStatus> {
        let status = record.status()?;
        let existing = self.members.get(&record.canister_id).copied();

        match (existing, status) {
            (None, RecordStatus::Identified) => self.identified.push(record.clone()),
            (None, RecordStatus::Unknown) => self.unknown.push(record.clone()),
            (Some(RecordStatus::Identified), RecordStatus::Unknown) => {
                return Ok(RecordStatus::Identified)
            }
            (Some(RecordStatus::Identified), RecordStatus::Identified) => {
                replace(&mut self.identified, record.clone())
            }
            (Some(RecordStatus::Unknown), RecordStatus::Unknown) => {
                replace(&mut self.unknown, record.clone())
            }
            (Some(RecordStatus::Unknown), RecordStatus::Identified) => {
                self.unknown.retain(|r| r.canister_id != record.canister_id);
                self.identified.push(record.clone());
            }
        }

        self.members.insert(record.canister_id, status);
        Ok(status)
    }

    /// Promote an Unknown record to Identified in place of its old entry.
    ///
    /// Returns false when `id` is not an Unknown member or the classification
    /// is not an identification.
    pub fn promote(
        &mut self,
        id: &CandidateId,
        classification: Classification,
        observed_on: NaiveDate,
    ) -> bool {
        if !classification.is_identified()
            || self.members.get(id) != Some(&RecordStatus::Unknown)
        {
            return false;
        }
        let Some(pos) = self.unknown.iter().position(|r| &r.canister_id == id) else {
            return false;
        };
        let mut record = self.unknown.remove(pos);
        record.promote(classification, observed_on);
        self.members.insert(id.clone(), RecordStatus::Identified);
        self.identified.push(record);
        true
    }

    pub fn contains(&self, id: &CandidateId) -> bool {
        self.members.contains_key(id)
    }

    pub fn status_of(&self, id: &CandidateId) -> Option<RecordStatus> {
        self.members.get(id).copied()
    }

    pub fn identified(&self) -> &[ResearchRecord] {
        &self.identified
    }

    pub fn unknown(&self) -> &[ResearchRecord] {
        &self.unknown
    }

    /// Identified records first, then Unknown, each in store order.
    pub fn records(&self) -> impl Iterator<Item = &ResearchRecord> {
        self.identified.iter().chain(self.unknown.iter())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

fn replace(records: &mut [ResearchRecord], record: ResearchRecord) {
    if let Some(slot) = records
        .iter_mut()
        .find(|r| r.canister_id == record.canister_id)
    {
        *slot = record;
    }
}
