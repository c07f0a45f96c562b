//! Out-of-band merge of independently grown result stores.
//!
//! Merging is keyed by candidate id. On collision the record from the later
//! store in the caller's ordering wins, except that an Identified record
//! always outranks an Unknown one regardless of order.

use crate::classify::Classifier;
use crate::core::{Candidate, CandidateId, RecordStatus, ResearchRecord};
use crate::error::Result;
use crate::store::{ResultStore, StorePaths};
use chrono::NaiveDate;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Authoritative merged view, ordered by candidate id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedView {
    identified: BTreeMap<CandidateId, ResearchRecord>,
    unknown: BTreeMap<CandidateId, ResearchRecord>,
}

/// Serialized shape of a [`UnifiedView`].
#[derive(Serialize)]
struct ViewDocument<'a> {
    identified: Vec<&'a ResearchRecord>,
    unknown: Vec<&'a ResearchRecord>,
}

/// Summary counts of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    pub total: usize,
    pub identified: usize,
    pub unknown: usize,
    pub categories: BTreeMap<&'static str, usize>,
    pub reasons: BTreeMap<&'static str, usize>,
}

/// Merge stores in the given order.
pub fn merge(stores: &[ResultStore]) -> UnifiedView {
    let mut view = UnifiedView::default();
    for store in stores {
        for record in store.records() {
            view.absorb(record.clone());
        }
    }
    debug!(
        inputs = stores.len(),
        identified = view.identified.len(),
        unknown = view.unknown.len(),
        "merged result stores"
    );
    view
}

impl UnifiedView {
    fn absorb(&mut self, record: ResearchRecord) {
        let id = record.canister_id.clone();
        if record.is_identified() {
            // promotion: a later identification retires any unknown entry
            self.unknown.remove(&id);
            self.identified.insert(id, record);
        } else if !self.identified.contains_key(&id) {
            self.unknown.insert(id, record);
        }
    }

    pub fn identified(&self) -> impl Iterator<Item = &ResearchRecord> {
        self.identified.values()
    }

    pub fn unknown(&self) -> impl Iterator<Item = &ResearchRecord> {
        self.unknown.values()
    }

    pub fn len(&self) -> usize {
        self.identified.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identified.is_empty() && self.unknown.is_empty()
    }

    pub fn status_of(&self, id: &CandidateId) -> Option<RecordStatus> {
        if self.identified.contains_key(id) {
            Some(RecordStatus::Identified)
        } else if self.unknown.contains_key(id) {
            Some(RecordStatus::Unknown)
        } else {
            None
        }
    }

    /// Union of every processed id.
    pub fn processed_ids(&self) -> BTreeSet<&CandidateId> {
        self.identified.keys().chain(self.unknown.keys()).collect()
    }

    /// Candidates of `universe` no store has processed, in universe order.
    pub fn unresearched<'a>(&self, universe: &'a [Candidate]) -> Vec<&'a Candidate> {
        universe
            .iter()
            .filter(|c| self.status_of(&c.id).is_none())
            .collect()
    }

    /// Identified records per category.
    pub fn category_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.identified.values() {
            let key = record.category.map_or("uncategorized", |c| c.as_str());
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Unknown records per reason.
    pub fn reason_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in self.unknown.values() {
            if let Some(reason) = record.reason {
                *counts.entry(reason.as_str()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn stats(&self) -> ViewStats {
        ViewStats {
            total: self.len(),
            identified: self.identified.len(),
            unknown: self.unknown.len(),
            categories: self.category_counts(),
            reasons: self.reason_counts(),
        }
    }

    /// Canonical JSON: both partitions, each sorted by id.
    pub fn to_json(&self) -> Result<String> {
        let doc = ViewDocument {
            identified: self.identified.values().collect(),
            unknown: self.unknown.values().collect(),
        };
        let mut text = serde_json::to_string_pretty(&doc)?;
        text.push('\n');
        Ok(text)
    }

    /// Hex SHA-256 of the canonical JSON.
    pub fn fingerprint(&self) -> Result<String> {
        let json = self.to_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }

    /// Convert back into a result store, in id order.
    pub fn into_store(self) -> Result<ResultStore> {
        ResultStore::from_records(self.identified.into_values().chain(self.unknown.into_values()))
    }

    /// Write the view as a pair of store files.
    pub fn save(self, paths: &StorePaths) -> Result<()> {
        paths.preflight()?;
        self.into_store()?.save(paths)
    }
}

/// Re-run `classifier` over the preserved evidence of every Unknown record.
///
/// Records that now reach an identification are promoted in place. Returns
/// the promoted ids in their former Unknown order.
pub fn reclassify(
    store: &mut ResultStore,
    classifier: &Classifier,
    observed_on: NaiveDate,
) -> Vec<CandidateId> {
    let verdicts: Vec<_> = store
        .unknown()
        .iter()
        .map(|record| (record.canister_id.clone(), classifier.classify(&record.evidence())))
        .filter(|(_, verdict)| verdict.is_identified())
        .collect();

    let mut promoted = Vec::with_capacity(verdicts.len());
    for (id, verdict) in verdicts {
        let project = verdict.project().map(str::to_string);
        if store.promote(&id, verdict, observed_on) {
            info!(canister = %id, project = project.as_deref().unwrap_or(""), "promoted");
            promoted.push(id);
        }
    }
    promoted
}
