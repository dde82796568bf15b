//! Merge of staged annotations into Chado
//!
//! NEW records get linkage rows (`feature_cvterm`) plus their properties.
//! UPDATE records keep their linkage rows; their polarity (`is_not`) is
//! refreshed, and their properties and extra publications are deleted and
//! written again from the staged values.

use super::detect::ChangeSet;
use super::ontology::Resolver;
use crate::cache::KeyCache;
use crate::catalog::Statement;
use crate::config::LoaderConfig;
use crate::report::{Phase, RowIssue};
use crate::staging::StagedAnnotation;
use crate::storage::{Session, StorageError, StorageResult};
use rusqlite::params;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Kinds of rows hanging off a linkage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Evidence,
    Qualifier,
    Date,
    AssignedBy,
    WithFrom,
    /// Extra publications (`feature_cvterm_pub`)
    Reference,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropertyCounts {
    /// Rows written for NEW records
    pub inserted: usize,
    /// Rows rewritten for UPDATE records
    pub replaced: usize,
    /// Rows on loaded linkages the batch did not touch
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub records_inserted: usize,
    pub records_updated: usize,
    pub records_skipped: usize,
    pub linkages_inserted: usize,
    pub properties: BTreeMap<PropertyKind, PropertyCounts>,
}

impl MergeReport {
    fn count(&mut self, tally: &BTreeMap<PropertyKind, usize>, replaced: bool) {
        for (kind, n) in tally {
            let counts = self.properties.entry(*kind).or_default();
            if replaced {
                counts.replaced += n;
            } else {
                counts.inserted += n;
            }
        }
    }
}

/// Type term ids of the properties stored in the namespace cv:
/// `qualifier`, `date`, `source` (assigned-by) and `with`
struct PropertyTypes {
    qualifier: i64,
    date: i64,
    source: i64,
    with: i64,
}

/// Everything a record's rows point at
struct Targets {
    feature_id: i64,
    pub_id: i64,
    evidence_id: i64,
    /// Plain term, or one synthesized term per resolved extension
    terms: Vec<i64>,
    extra_pubs: Vec<i64>,
}

pub struct MergeApplier<'a> {
    config: &'a LoaderConfig,
    cache: &'a KeyCache,
}

impl<'a> MergeApplier<'a> {
    pub fn new(config: &'a LoaderConfig, cache: &'a KeyCache) -> Self {
        Self { config, cache }
    }

    pub fn apply(
        &self,
        session: &Session<'_>,
        staged: &[StagedAnnotation],
        changes: &ChangeSet,
        issues: &mut Vec<RowIssue>,
    ) -> StorageResult<MergeReport> {
        let resolver = Resolver::new(session, self.cache, &self.config.internal_db);
        let types = self.property_types(&resolver)?;
        let mut report = MergeReport::default();

        session.atomically("gpad_insert", |_| {
            self.insert_new(&resolver, &types, staged, &mut report, issues)
        })?;
        self.replace_updated(&resolver, &types, staged, changes, &mut report, issues)?;
        self.count_untouched(session, changes, &mut report)?;

        info!(
            "Merge: {} inserted ({} linkages), {} updated, {} skipped",
            report.records_inserted, report.linkages_inserted, report.records_updated, report.records_skipped
        );
        Ok(report)
    }

    fn property_types(&self, resolver: &Resolver<'_, '_>) -> StorageResult<PropertyTypes> {
        let ns = &self.config.namespace;
        Ok(PropertyTypes {
            qualifier: resolver.term(ns, "qualifier", false)?.id,
            date: resolver.term(ns, "date", false)?.id,
            source: resolver.term(ns, "source", false)?.id,
            with: resolver.term(ns, "with", false)?.id,
        })
    }

    /// Resolve every id a record needs, or explain what is missing.
    fn resolve_targets(
        &self,
        resolver: &Resolver<'_, '_>,
        annotation: &StagedAnnotation,
        issues: &mut Vec<RowIssue>,
    ) -> StorageResult<Result<Targets, String>> {
        let c = self.config;
        let record = &annotation.record;

        let Some(feature_id) = resolver.feature(&record.gene_id)? else {
            return Ok(Err(format!("feature {} not found", record.gene_id)));
        };
        let Some(pub_id) = resolver.publication(&record.reference.id, &record.reference.namespace)? else {
            return Ok(Err(format!("publication {} not found", record.reference)));
        };
        let Some(evidence_id) = resolver.term_by_accession(&c.evidence_db, &record.evidence_code)? else {
            return Ok(Err(format!("evidence code {}:{} not found", c.evidence_db, record.evidence_code)));
        };

        let mut terms = Vec::new();
        for (_, name) in annotation.extension_terms() {
            if let Some(name) = name {
                if let Some(id) = resolver.find_term(&c.anon_cv, name)? {
                    terms.push(id);
                }
            }
        }
        if terms.is_empty() {
            match resolver.term_by_accession(&c.term_db, &record.term_id)? {
                Some(id) => terms.push(id),
                None => return Ok(Err(format!("term {}:{} not found", c.term_db, record.term_id))),
            }
        }

        let mut extra_pubs = Vec::new();
        for reference in &record.extra_references {
            match resolver.publication(&reference.id, &reference.namespace)? {
                Some(id) => extra_pubs.push(id),
                None => issues.push(RowIssue::new(
                    Phase::Apply,
                    record.digest.clone(),
                    format!("extra publication {} not found", reference),
                )),
            }
        }

        Ok(Ok(Targets {
            feature_id,
            pub_id,
            evidence_id,
            terms,
            extra_pubs,
        }))
    }

    fn insert_new(
        &self,
        resolver: &Resolver<'_, '_>,
        types: &PropertyTypes,
        staged: &[StagedAnnotation],
        report: &mut MergeReport,
        issues: &mut Vec<RowIssue>,
    ) -> StorageResult<()> {
        let session = resolver.session();

        for annotation in staged.iter().filter(|a| !a.is_update) {
            let record = &annotation.record;
            let targets = match self.resolve_targets(resolver, annotation, issues)? {
                Ok(targets) => targets,
                Err(reason) => {
                    warn!("Skipping {} ({}): {}", record.gene_id, record.digest, reason);
                    report.records_skipped += 1;
                    issues.push(RowIssue::new(Phase::Apply, record.digest.clone(), reason));
                    continue;
                }
            };

            for &term_id in &targets.terms {
                let insert = || -> StorageResult<BTreeMap<PropertyKind, usize>> {
                    let next: i64 = session.query_i64(
                        Statement::NextFeatureCvtermRank,
                        params![targets.feature_id, term_id, targets.pub_id],
                    )?;
                    let rank = next.max(record.rank as i64);
                    let linkage = session.insert(
                        Statement::InsertFeatureCvterm,
                        params![targets.feature_id, term_id, targets.pub_id, record.is_not(), rank],
                    )?;
                    self.write_properties(session, types, linkage, annotation, &targets)
                };
                let tally = insert().map_err(|e| e.for_record(record.digest.clone()))?;
                report.count(&tally, false);
                report.linkages_inserted += 1;
            }
            report.records_inserted += 1;
        }
        Ok(())
    }

    fn replace_updated(
        &self,
        resolver: &Resolver<'_, '_>,
        types: &PropertyTypes,
        staged: &[StagedAnnotation],
        changes: &ChangeSet,
        report: &mut MergeReport,
        issues: &mut Vec<RowIssue>,
    ) -> StorageResult<()> {
        let session = resolver.session();
        let mut seen = HashSet::new();

        for annotation in staged.iter().filter(|a| a.is_update) {
            let digest = annotation.record.digest.as_str();
            if !seen.insert(digest) {
                continue;
            }

            let targets = match self.resolve_targets(resolver, annotation, issues)? {
                Ok(targets) => targets,
                Err(reason) => {
                    warn!("Not refreshing {}: {}", digest, reason);
                    report.records_skipped += 1;
                    issues.push(RowIssue::new(Phase::Apply, digest, reason));
                    continue;
                }
            };

            let linkages = changes.linkages_for(digest);
            let tally = session
                .atomically("gpad_update", |s| {
                    let mut tally = BTreeMap::new();
                    for &linkage in linkages {
                        s.execute(
                            Statement::UpdateFeatureCvtermIsNot,
                            params![annotation.record.is_not(), linkage],
                        )?;
                        s.execute(Statement::DeleteFeatureCvtermprops, params![linkage])?;
                        s.execute(Statement::DeleteFeatureCvtermPubs, params![linkage])?;
                        for (kind, n) in self.write_properties(s, types, linkage, annotation, &targets)? {
                            *tally.entry(kind).or_insert(0) += n;
                        }
                    }
                    Ok(tally)
                })
                .map_err(|e: StorageError| e.for_record(digest))?;

            debug!("Refreshed {} linkage(s) for {}", linkages.len(), digest);
            report.count(&tally, true);
            report.records_updated += 1;
        }
        Ok(())
    }

    /// Tally the rows hanging off linkages outside the batch.
    fn count_untouched(
        &self,
        session: &Session<'_>,
        changes: &ChangeSet,
        report: &mut MergeReport,
    ) -> StorageResult<()> {
        let c = self.config;
        for &linkage in &changes.untouched {
            let types = session.query_map(Statement::SelectFeatureCvtermpropTypes, params![linkage], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?;
            for (cv, name) in types {
                let kind = if cv == c.evidence_cv {
                    PropertyKind::Evidence
                } else if cv != c.namespace {
                    continue;
                } else {
                    match name.as_str() {
                        "qualifier" => PropertyKind::Qualifier,
                        "date" => PropertyKind::Date,
                        "source" => PropertyKind::AssignedBy,
                        "with" => PropertyKind::WithFrom,
                        _ => continue,
                    }
                };
                report.properties.entry(kind).or_default().unchanged += 1;
            }

            let pubs = session.query_i64(Statement::CountFeatureCvtermPubs, params![linkage])?;
            if pubs > 0 {
                report.properties.entry(PropertyKind::Reference).or_default().unchanged += pubs as usize;
            }
        }
        Ok(())
    }

    /// Write evidence, qualifiers, date, source, with/from and extra
    /// publications for one linkage. Returns rows written per kind.
    fn write_properties(
        &self,
        session: &Session<'_>,
        types: &PropertyTypes,
        linkage: i64,
        annotation: &StagedAnnotation,
        targets: &Targets,
    ) -> StorageResult<BTreeMap<PropertyKind, usize>> {
        let record = &annotation.record;
        let mut tally = BTreeMap::new();
        let mut prop = |kind: PropertyKind, type_id: i64, value: &str, rank: usize| -> StorageResult<()> {
            let n = session.execute(
                Statement::InsertFeatureCvtermprop,
                params![linkage, type_id, value, rank as i64],
            )?;
            *tally.entry(kind).or_insert(0) += n;
            Ok(())
        };

        prop(PropertyKind::Evidence, targets.evidence_id, "", 0)?;
        for (rank, qualifier) in record.qualifiers.iter().enumerate() {
            prop(PropertyKind::Qualifier, types.qualifier, qualifier, rank)?;
        }
        if !record.date_curated.is_empty() {
            prop(PropertyKind::Date, types.date, &record.date_curated, 0)?;
        }
        prop(PropertyKind::AssignedBy, types.source, &record.assigned_by, 0)?;
        for (rank, value) in record.with_from.iter().enumerate() {
            prop(PropertyKind::WithFrom, types.with, value, rank)?;
        }

        for &pub_id in &targets.extra_pubs {
            let n = session.execute(Statement::InsertFeatureCvtermPub, params![linkage, pub_id])?;
            *tally.entry(PropertyKind::Reference).or_insert(0) += n;
        }
        Ok(tally)
    }
}
