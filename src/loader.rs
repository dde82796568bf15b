//! Namespace load driver
//!
//! A load runs stage → detect → synthesize → apply inside one outer
//! savepoint. Each phase nests its own savepoint; any fatal error rolls the
//! whole load back and clears the key cache, since ids minted inside the
//! rolled-back transaction no longer exist.

use crate::cache::KeyCache;
use crate::catalog::Statement;
use crate::chado::{AnonTermSynthesizer, ChangeDetector, ChangeSet, MergeApplier, MergeReport, SynthesisReport};
use crate::config::LoaderConfig;
use crate::report::{LoadReport, Phase, RowIssue};
use crate::staging::{read_staged, StagingBuffer};
use crate::storage::{ChadoStore, Session, StorageError};
use chrono::Utc;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const LOAD_SAVEPOINT: &str = "gpad_load";

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A load that was rolled back
#[derive(Debug, Error)]
#[error("{phase} phase failed: {source}")]
pub struct LoadError {
    pub phase: Phase,
    #[source]
    pub source: LoadFailure,
}

impl LoadError {
    pub fn new(phase: Phase, source: impl Into<LoadFailure>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    /// True for database-engine failures, where rerunning the load may work
    pub fn is_retryable(&self) -> bool {
        match &self.source {
            LoadFailure::Storage(e) => e.is_transient(),
            LoadFailure::Io(_) => false,
        }
    }

    /// The first statement that failed, when known
    pub fn statement(&self) -> Option<Statement> {
        match &self.source {
            LoadFailure::Storage(e) => e.statement(),
            LoadFailure::Io(_) => None,
        }
    }

    /// Digest of the record being written when the load failed
    pub fn record(&self) -> Option<&str> {
        match &self.source {
            LoadFailure::Storage(e) => e.record(),
            LoadFailure::Io(_) => None,
        }
    }
}

fn at(phase: Phase) -> impl Fn(StorageError) -> LoadError {
    move |e| LoadError::new(phase, e)
}

struct Phases {
    changes: ChangeSet,
    synthesis: SynthesisReport,
    merge: MergeReport,
}

/// Loads GPAD batches into one annotation namespace
pub struct GpadLoader {
    store: Arc<ChadoStore>,
    config: LoaderConfig,
    cache: Arc<KeyCache>,
}

impl GpadLoader {
    pub fn new(store: Arc<ChadoStore>, config: LoaderConfig) -> Self {
        Self {
            store,
            config,
            cache: Arc::new(KeyCache::new()),
        }
    }

    /// Share a key cache between loaders on the same store
    pub fn with_cache(mut self, cache: Arc<KeyCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<ChadoStore> {
        &self.store
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadReport, LoadError> {
        let path = path.as_ref();
        info!("Reading {}", path.display());
        let file = File::open(path).map_err(|e| LoadError::new(Phase::Stage, e))?;
        self.load_reader(BufReader::new(file))
    }

    pub fn load_reader<R: BufRead>(&self, reader: R) -> Result<LoadReport, LoadError> {
        let mut buffer = StagingBuffer::new();
        buffer.read_from(reader).map_err(|e| LoadError::new(Phase::Stage, e))?;
        self.load_buffer(buffer)
    }

    /// Load an already-filled buffer
    pub fn load_buffer(&self, mut buffer: StagingBuffer) -> Result<LoadReport, LoadError> {
        let started_at = Utc::now();
        let namespace = self.config.namespace.clone();
        let _guard = self.store.begin_load(&namespace).map_err(at(Phase::Stage))?;

        let mut issues = buffer.take_issues();
        let outcome = self
            .store
            .with_session(|session| Ok::<_, StorageError>(self.transaction(session, &buffer, &mut issues)))
            .map_err(at(Phase::Stage))
            .and_then(|result| result);

        let phases = match outcome {
            Ok(phases) => phases,
            Err(e) => {
                warn!("Load of {} rolled back: {}", namespace, e);
                self.cache.clear();
                return Err(e);
            }
        };

        let report = LoadReport {
            namespace,
            mode: phases.changes.mode,
            started_at,
            finished_at: Utc::now(),
            staged: buffer.record_count(),
            new: phases.changes.new,
            updated: phases.changes.updated,
            unchanged: phases.changes.unchanged,
            linkages_inserted: phases.merge.linkages_inserted,
            records_skipped: phases.merge.records_skipped,
            properties: phases.merge.properties,
            synthesis: phases.synthesis,
            staging_rows: buffer.row_counts(),
            issues,
        };
        info!(
            "Loaded {} ({}): {} staged, {} new, {} updated, {} unchanged",
            report.namespace, report.mode, report.staged, report.new, report.updated, report.unchanged
        );
        Ok(report)
    }

    fn transaction(
        &self,
        session: &Session<'_>,
        buffer: &StagingBuffer,
        issues: &mut Vec<RowIssue>,
    ) -> Result<Phases, LoadError> {
        session.savepoint(LOAD_SAVEPOINT).map_err(at(Phase::Stage))?;
        match self.run_phases(session, buffer, issues) {
            Ok(phases) => {
                session.release(LOAD_SAVEPOINT).map_err(at(Phase::Apply))?;
                Ok(phases)
            }
            Err(e) => {
                if let Err(rollback) = session.rollback_to(LOAD_SAVEPOINT) {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    fn run_phases(
        &self,
        session: &Session<'_>,
        buffer: &StagingBuffer,
        issues: &mut Vec<RowIssue>,
    ) -> Result<Phases, LoadError> {
        let rows = buffer.flush(session).map_err(at(Phase::Stage))?;
        info!("Staged {} records ({} rows)", buffer.record_count(), rows);

        let changes = session
            .atomically("gpad_detect", |s| {
                let mut staged = read_staged(s)?;
                ChangeDetector::new(&self.config).detect(s, &mut staged)
            })
            .map_err(at(Phase::Detect))?;

        let synthesis = session
            .atomically("gpad_synthesize", |s| {
                AnonTermSynthesizer::new(&self.config, &self.cache).synthesize(s, issues)
            })
            .map_err(at(Phase::Synthesize))?;

        let merge = session
            .atomically("gpad_apply", |s| {
                let staged = read_staged(s)?;
                MergeApplier::new(&self.config, &self.cache).apply(s, &staged, &changes, issues)
            })
            .map_err(at(Phase::Apply))?;

        Ok(Phases {
            changes,
            synthesis,
            merge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, NamedStatements};
    use crate::storage::OpenStore;

    const LINE: &str = "dictyBase\tDDB_G0272003\tenables\tGO:0000015\tPMID:21515711\tECO:0000256\t\t\t20140222\tInterPro\t\t";

    #[test]
    fn test_unresolvable_records_are_skipped_not_fatal() {
        let store = Arc::new(ChadoStore::open_in_memory().unwrap());
        let loader = GpadLoader::new(store, LoaderConfig::default());

        let report = loader.load_reader(LINE.as_bytes()).unwrap();
        assert_eq!(report.staged, 1);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(report.linkages_inserted, 0);
        assert!(report.issues.iter().any(|i| i.phase == Phase::Apply && i.reason.contains("feature")));
    }

    #[test]
    fn test_missing_statement_fails_with_phase_and_clears_cache() {
        let catalog = NamedStatements::bundled().unwrap().without_statement(Statement::SelectAnonCvterm);
        let store = ChadoStore::open_in_memory_with_catalog(Arc::new(catalog)).unwrap();
        store.deploy_schema().unwrap();
        let loader = GpadLoader::new(Arc::new(store), LoaderConfig::default());

        let err = loader.load_reader(LINE.as_bytes()).unwrap_err();
        assert_eq!(err.phase, Phase::Synthesize);
        assert!(!err.is_retryable());
        assert!(matches!(
            err.source,
            LoadFailure::Storage(StorageError::Catalog(CatalogError::StatementNotFound("select_anon_cvterm")))
        ));
        assert!(loader.cache().is_empty());
        // The namespace guard was released
        assert!(loader.store().loading_namespaces().is_empty());
    }

    #[test]
    fn test_missing_file_is_a_stage_error() {
        let store = Arc::new(ChadoStore::open_in_memory().unwrap());
        let loader = GpadLoader::new(store, LoaderConfig::default());
        let err = loader.load_path("/nonexistent/file.gpad").unwrap_err();
        assert_eq!(err.phase, Phase::Stage);
        assert!(matches!(err.source, LoadFailure::Io(_)));
    }
}
