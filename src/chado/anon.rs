//! Anonymous extension terms
//!
//! An annotation extension such as `has_regulation_target(UniProtKB:Q54BD4)`
//! on `GO:0006355` is stored as a synthetic cvterm standing for "GO:0006355
//! that has regulation target Q54BD4". The term's name is the digest of
//! (original term, relationship, target namespace, target id), so the same
//! tuple always maps to the same term across batches and runs.
//!
//! Each new term gets:
//! - an `is_a` link to the original term
//! - a link to the target, typed by a relationship term: a
//!   `cvterm_relationship` when the target is itself a known term, otherwise
//!   a `cvtermprop` holding `namespace:id`
//! - a `cvterm_dbxref` to the target's dbxref, registering it if unseen

use super::ontology::Resolver;
use crate::cache::KeyCache;
use crate::catalog::Statement;
use crate::config::LoaderConfig;
use crate::gpad::anon_term_digest;
use crate::report::{Phase, RowIssue};
use crate::storage::{Session, StorageResult};
use rusqlite::params;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// A distinct (term, relationship, target) combination awaiting a term
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionTuple {
    /// Local id of the annotated term
    pub term_id: String,
    pub relationship: String,
    pub namespace: String,
    pub local_id: String,
}

impl ExtensionTuple {
    pub fn original_term(&self, term_db: &str) -> String {
        format!("{}:{}", term_db, self.term_id)
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.namespace, self.local_id)
    }

    /// Name of the synthetic term for this tuple
    pub fn term_name(&self, term_db: &str) -> String {
        anon_term_digest(&self.original_term(term_db), &self.relationship, &self.namespace, &self.local_id)
    }
}

impl fmt::Display for ExtensionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({}:{})", self.term_id, self.relationship, self.namespace, self.local_id)
    }
}

/// Counts from one synthesis pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    pub created: usize,
    pub reused: usize,
    /// Target dbxrefs first seen in this pass
    pub targets_registered: usize,
    pub unresolved: usize,
}

enum Outcome {
    Created { target_registered: bool },
    Reused,
    Unresolved,
}

pub struct AnonTermSynthesizer<'a> {
    config: &'a LoaderConfig,
    cache: &'a KeyCache,
}

impl<'a> AnonTermSynthesizer<'a> {
    pub fn new(config: &'a LoaderConfig, cache: &'a KeyCache) -> Self {
        Self { config, cache }
    }

    /// Distinct staged tuples without a synthetic term yet
    pub fn pending(&self, session: &Session<'_>) -> StorageResult<Vec<ExtensionTuple>> {
        session.query_map(Statement::SelectAnonCvterm, [], |r| {
            Ok(ExtensionTuple {
                term_id: r.get(0)?,
                relationship: r.get(1)?,
                namespace: r.get(2)?,
                local_id: r.get(3)?,
            })
        })
    }

    /// Create or reuse a term for every pending tuple and write its name back
    /// onto the staged extension rows. Tuples whose original term is not in
    /// the store are recorded in `issues` and left unassigned.
    pub fn synthesize(&self, session: &Session<'_>, issues: &mut Vec<RowIssue>) -> StorageResult<SynthesisReport> {
        let resolver = Resolver::new(session, self.cache, &self.config.internal_db);
        let mut report = SynthesisReport::default();

        for tuple in self.pending(session)? {
            match self.synthesize_tuple(&resolver, &tuple)? {
                Outcome::Created { target_registered } => {
                    report.created += 1;
                    if target_registered {
                        report.targets_registered += 1;
                    }
                }
                Outcome::Reused => report.reused += 1,
                Outcome::Unresolved => {
                    warn!("No term {} for extension {}", tuple.original_term(&self.config.term_db), tuple);
                    report.unresolved += 1;
                    issues.push(RowIssue::new(
                        Phase::Synthesize,
                        tuple.to_string(),
                        format!("term {} not found", tuple.original_term(&self.config.term_db)),
                    ));
                }
            }
        }

        info!(
            "Extension terms: {} created, {} reused, {} unresolved",
            report.created, report.reused, report.unresolved
        );
        Ok(report)
    }

    fn synthesize_tuple(&self, resolver: &Resolver<'_, '_>, tuple: &ExtensionTuple) -> StorageResult<Outcome> {
        let c = self.config;
        let Some(original_id) = resolver.term_by_accession(&c.term_db, &tuple.term_id)? else {
            return Ok(Outcome::Unresolved);
        };

        let name = tuple.term_name(&c.term_db);
        let outcome = match resolver.find_term(&c.anon_cv, &name)? {
            Some(_) => Outcome::Reused,
            None => {
                let target_registered = self.create_term(resolver, tuple, &name, original_id)?;
                Outcome::Created { target_registered }
            }
        };

        resolver.session().execute(
            Statement::UpdateTempWithAnonCvterm,
            params![name, tuple.term_id, tuple.relationship, tuple.namespace, tuple.local_id],
        )?;
        Ok(outcome)
    }

    /// Returns whether the target dbxref was registered by this call.
    fn create_term(
        &self,
        resolver: &Resolver<'_, '_>,
        tuple: &ExtensionTuple,
        name: &str,
        original_id: i64,
    ) -> StorageResult<bool> {
        let c = self.config;
        let session = resolver.session();

        let definition = format!(
            "{} {} {}",
            tuple.original_term(&c.term_db),
            tuple.relationship,
            tuple.target()
        );
        let dbxref_id = resolver.dbxref(&c.anon_db, name)?.id;
        let term_id = resolver.create_term(&c.anon_cv, name, &definition, dbxref_id)?;

        let is_a = resolver.term(&c.is_a_cv, "is_a", true)?.id;
        session.execute(Statement::InsertCvtermRelationship, params![is_a, term_id, original_id])?;

        let relation = resolver.term(&c.relation_cv, &tuple.relationship, true)?.id;
        match resolver.term_by_accession(&tuple.namespace, &tuple.local_id)? {
            Some(target_id) => {
                session.execute(Statement::InsertCvtermRelationship, params![relation, term_id, target_id])?;
            }
            None => {
                session.execute(Statement::InsertCvtermprop, params![term_id, relation, tuple.target(), 0])?;
            }
        }

        let target = resolver.dbxref(&tuple.namespace, &tuple.local_id)?;
        session.execute(Statement::InsertCvtermDbxref, params![term_id, target.id])?;

        debug!("Created extension term {} for {}", name, definition);
        Ok(target.created)
    }
}
