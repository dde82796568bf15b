//! Change detection
//!
//! Decides whether a namespace is loaded for the first time (FRESH) or
//! merged into existing annotations (MERGE). On MERGE every loaded linkage
//! has its digest recomputed with the same function used at staging time;
//! staged records whose digest matches become updates.

use crate::catalog::Statement;
use crate::config::LoaderConfig;
use crate::gpad::record_digest;
use crate::staging::StagedAnnotation;
use crate::storage::{Session, StorageResult};
use rusqlite::params;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// Nothing loaded yet for the namespace
    Fresh,
    Merge,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Fresh => f.write_str("fresh"),
            LoadMode::Merge => f.write_str("merge"),
        }
    }
}

/// An annotation already in the store, as seen by change detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedGpad {
    pub feature_cvterm_id: i64,
    pub gene_id: String,
    /// Local id of the annotated term, or of the term an extension term
    /// was derived from
    pub term_id: String,
    pub evidence_code: String,
    pub assigned_by: String,
}

impl LoadedGpad {
    pub fn digest(&self) -> String {
        record_digest(&self.gene_id, &self.term_id, &self.evidence_code, &self.assigned_by)
    }
}

/// Classification of a staged batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub mode: LoadMode,
    pub new: usize,
    pub updated: usize,
    /// Distinct loaded digests absent from the batch
    pub unchanged: usize,
    /// Loaded linkage ids per matched digest
    pub linkages: HashMap<String, Vec<i64>>,
    /// Loaded linkage ids whose digest is absent from the batch
    pub untouched: Vec<i64>,
}

impl ChangeSet {
    pub fn linkages_for(&self, digest: &str) -> &[i64] {
        self.linkages.get(digest).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct ChangeDetector<'a> {
    config: &'a LoaderConfig,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(config: &'a LoaderConfig) -> Self {
        Self { config }
    }

    /// Number of annotations loaded for the namespace
    pub fn loaded_count(&self, session: &Session<'_>) -> StorageResult<i64> {
        session.query_i64(Statement::CountAllGpadsFromChado, params![self.config.namespace])
    }

    pub fn loaded(&self, session: &Session<'_>) -> StorageResult<Vec<LoadedGpad>> {
        let c = self.config;
        session.query_map(
            Statement::SelectAllGpadsFromChado,
            params![c.namespace, c.evidence_cv, c.anon_cv, c.is_a_cv],
            |r| {
                Ok(LoadedGpad {
                    feature_cvterm_id: r.get(0)?,
                    gene_id: r.get(1)?,
                    term_id: r.get(2)?,
                    evidence_code: r.get(3)?,
                    assigned_by: r.get::<_, Option<String>>(4)?.unwrap_or_default(),
                })
            },
        )
    }

    /// Classify `staged` in place and flag updates in the staging table.
    pub fn detect(&self, session: &Session<'_>, staged: &mut [StagedAnnotation]) -> StorageResult<ChangeSet> {
        if self.loaded_count(session)? == 0 {
            info!("No annotations loaded for {}: fresh load", self.config.namespace);
            for annotation in staged.iter_mut() {
                annotation.is_update = false;
            }
            return Ok(ChangeSet {
                mode: LoadMode::Fresh,
                new: staged.len(),
                updated: 0,
                unchanged: 0,
                linkages: HashMap::new(),
                untouched: Vec::new(),
            });
        }

        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, annotation) in staged.iter().enumerate() {
            index.entry(annotation.record.digest.clone()).or_default().push(position);
        }

        let mut linkages: HashMap<String, Vec<i64>> = HashMap::new();
        let mut unchanged: HashSet<String> = HashSet::new();
        let mut untouched = Vec::new();
        for loaded in self.loaded(session)? {
            let digest = loaded.digest();
            if index.contains_key(&digest) {
                linkages.entry(digest).or_default().push(loaded.feature_cvterm_id);
            } else {
                untouched.push(loaded.feature_cvterm_id);
                unchanged.insert(digest);
            }
        }

        for digest in linkages.keys() {
            session.execute(Statement::MarkGpadUpdate, params![digest])?;
            for &position in &index[digest] {
                staged[position].is_update = true;
            }
        }

        let updated = staged.iter().filter(|a| a.is_update).count();
        let changes = ChangeSet {
            mode: LoadMode::Merge,
            new: staged.len() - updated,
            updated,
            unchanged: unchanged.len(),
            linkages,
            untouched,
        };
        debug!(
            "Change detection: {} new, {} updated, {} unchanged",
            changes.new, changes.updated, changes.unchanged
        );
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpad::{AnnotationRecord, Reference};
    use crate::storage::{ChadoStore, OpenStore};

    fn staged(gene: &str) -> StagedAnnotation {
        let mut record = AnnotationRecord {
            gene_id: gene.to_string(),
            term_id: "0000015".to_string(),
            evidence_code: "0000256".to_string(),
            assigned_by: "InterPro".to_string(),
            date_curated: "20140222".to_string(),
            reference: Reference::new("1", "PubMed"),
            extra_references: vec![],
            qualifiers: vec![],
            with_from: vec![],
            extensions: vec![],
            digest: String::new(),
            rank: 0,
        };
        record.digest = record.compute_digest();
        StagedAnnotation {
            record,
            is_update: false,
            anon_terms: vec![],
        }
    }

    #[test]
    fn test_loaded_digest_matches_staged_digest() {
        let s = staged("DDB_G0272003");
        let loaded = LoadedGpad {
            feature_cvterm_id: 1,
            gene_id: "DDB_G0272003".into(),
            term_id: "0000015".into(),
            evidence_code: "0000256".into(),
            assigned_by: "InterPro".into(),
        };
        assert_eq!(loaded.digest(), s.record.digest);
    }

    #[test]
    fn test_empty_namespace_is_fresh() {
        let store = ChadoStore::open_in_memory().unwrap();
        let config = LoaderConfig::default();
        let mut batch = vec![staged("DDB_G0272003"), staged("DDB_G0272004")];

        let changes = store
            .with_session(|s| ChangeDetector::new(&config).detect(s, &mut batch))
            .unwrap();
        assert_eq!(changes.mode, LoadMode::Fresh);
        assert_eq!((changes.new, changes.updated, changes.unchanged), (2, 0, 0));
        assert!(changes.linkages_for(&batch[0].record.digest).is_empty());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(LoadMode::Merge.to_string(), "merge");
        assert_eq!(serde_json::to_string(&LoadMode::Fresh).unwrap(), "\"fresh\"");
    }
}
