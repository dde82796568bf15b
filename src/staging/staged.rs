//! Reading staged records back out of the staging tables

use crate::catalog::Statement;
use crate::gpad::{AnnotationRecord, ExtensionEntry, Reference};
use crate::storage::{Session, StorageResult};
use std::collections::HashMap;

/// A staged annotation with its satellite rows reattached
#[derive(Debug, Clone, PartialEq)]
pub struct StagedAnnotation {
    pub record: AnnotationRecord,
    /// Set by change detection when the digest is already loaded
    pub is_update: bool,
    /// Synthesized term name for each entry of `record.extensions`
    pub anon_terms: Vec<Option<String>>,
}

impl StagedAnnotation {
    /// Extension entries paired with their synthesized term, if any
    pub fn extension_terms(&self) -> impl Iterator<Item = (&ExtensionEntry, Option<&str>)> {
        self.record
            .extensions
            .iter()
            .zip(self.anon_terms.iter())
            .map(|(entry, term)| (entry, term.as_deref()))
    }
}

#[derive(Debug, Default)]
struct Satellites {
    qualifiers: Vec<String>,
    with_from: Vec<String>,
    references: Vec<Reference>,
    extensions: Vec<(ExtensionEntry, Option<String>)>,
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn to_rank(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Load every staged record in staging order.
///
/// Satellite rows are keyed by digest only, so records sharing a digest
/// share (deduplicated) satellites.
pub fn read_staged(session: &Session<'_>) -> StorageResult<Vec<StagedAnnotation>> {
    let mut satellites: HashMap<String, Satellites> = HashMap::new();

    for (digest, qualifier) in session.query_map(Statement::SelectStagedQualifiers, [], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })? {
        push_unique(&mut satellites.entry(digest).or_default().qualifiers, qualifier);
    }

    for (digest, value) in session.query_map(Statement::SelectStagedWithfrom, [], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })? {
        push_unique(&mut satellites.entry(digest).or_default().with_from, value);
    }

    for (digest, reference) in session.query_map(Statement::SelectStagedReferences, [], |r| {
        Ok((r.get::<_, String>(0)?, Reference::new(r.get::<_, String>(1)?, r.get::<_, String>(2)?)))
    })? {
        push_unique(&mut satellites.entry(digest).or_default().references, reference);
    }

    for (digest, entry, anon) in session.query_map(Statement::SelectStagedExtensions, [], |r| {
        let entry = ExtensionEntry {
            relationship: r.get(1)?,
            namespace: r.get(2)?,
            local_id: r.get(3)?,
            rank: to_rank(r.get(4)?),
        };
        Ok((r.get::<_, String>(0)?, entry, r.get::<_, Option<String>>(5)?))
    })? {
        let extensions = &mut satellites.entry(digest).or_default().extensions;
        let seen = extensions.iter().any(|(e, _)| {
            e.relationship == entry.relationship && e.namespace == entry.namespace && e.local_id == entry.local_id
        });
        if !seen {
            extensions.push((entry, anon));
        }
    }

    let rows = session.query_map(Statement::SelectStagedGpads, [], |r| {
        let record = AnnotationRecord {
            digest: r.get(0)?,
            gene_id: r.get(1)?,
            term_id: r.get(2)?,
            reference: Reference::new(r.get::<_, String>(3)?, r.get::<_, String>(4)?),
            evidence_code: r.get(5)?,
            date_curated: r.get::<_, Option<String>>(6)?.unwrap_or_default(),
            assigned_by: r.get(7)?,
            rank: to_rank(r.get(8)?),
            extra_references: Vec::new(),
            qualifiers: Vec::new(),
            with_from: Vec::new(),
            extensions: Vec::new(),
        };
        Ok((record, r.get::<_, i64>(9)? != 0))
    })?;

    Ok(rows
        .into_iter()
        .map(|(mut record, is_update)| {
            let mut anon_terms = Vec::new();
            if let Some(sat) = satellites.get(&record.digest) {
                record.qualifiers = sat.qualifiers.clone();
                record.with_from = sat.with_from.clone();
                record.extra_references = sat.references.clone();
                for (entry, anon) in &sat.extensions {
                    record.extensions.push(entry.clone());
                    anon_terms.push(anon.clone());
                }
            }
            StagedAnnotation {
                record,
                is_update,
                anon_terms,
            }
        })
        .collect())
}
