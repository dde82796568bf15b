//! GPAD 1.1 line parsing

use super::record::{AnnotationRecord, ExtensionEntry, Reference};
use std::collections::HashMap;
use thiserror::Error;

/// Columns required through assigned-by (column 9).
pub const MIN_COLUMNS: usize = 10;

const COL_GENE: usize = 1;
const COL_QUALIFIER: usize = 2;
const COL_TERM: usize = 3;
const COL_REFERENCE: usize = 4;
const COL_EVIDENCE: usize = 5;
const COL_WITH_FROM: usize = 6;
const COL_DATE: usize = 8;
const COL_ASSIGNED_BY: usize = 9;
const COL_EXTENSION: usize = 10;

/// A line that cannot be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected at least {expected} tab-separated columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },

    #[error("{field} '{value}' has no namespace prefix")]
    MissingPrefix { field: &'static str, value: String },

    #[error("{field} is empty")]
    EmptyField { field: &'static str },
}

/// Outcome of parsing a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Blank or `!` comment line
    Skipped,
    Annotation {
        record: AnnotationRecord,
        /// Extension tokens that did not match `relation(ns:id)`
        dropped_extensions: Vec<String>,
    },
}

/// Split a pipe-delimited column into its non-empty, trimmed values.
fn split_multi(field: &str) -> Vec<String> {
    field
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(columns: &[&'a str], index: usize, field: &'static str) -> Result<&'a str, ParseError> {
    let value = columns[index].trim();
    if value.is_empty() {
        return Err(ParseError::EmptyField { field });
    }
    Ok(value)
}

/// Local part of a prefixed identifier (`GO:0000015` -> `0000015`).
fn local_part(value: &str, field: &'static str) -> Result<String, ParseError> {
    match value.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => Ok(local.to_string()),
        _ => Err(ParseError::MissingPrefix {
            field,
            value: value.to_string(),
        }),
    }
}

/// Parse the extension column.
///
/// Pipe groups and the comma-joined conjuncts inside them are flattened;
/// every non-empty token gets the next rank in input order. Returns the
/// entries that parsed plus the tokens that did not.
pub fn parse_extensions(field: &str) -> (Vec<ExtensionEntry>, Vec<String>) {
    let mut entries = Vec::new();
    let mut dropped = Vec::new();

    let tokens = field
        .split('|')
        .flat_map(|group| group.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    for (rank, token) in tokens.enumerate() {
        match ExtensionEntry::parse(token, rank) {
            Some(entry) => entries.push(entry),
            None => dropped.push(token.to_string()),
        }
    }
    (entries, dropped)
}

/// Parse one GPAD line into a record with rank 0.
///
/// Rank assignment needs batch state; see [`RecordNormalizer`].
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('!') {
        return Ok(ParsedLine::Skipped);
    }

    let columns: Vec<&str> = line.split('\t').collect();
    if columns.len() < MIN_COLUMNS {
        return Err(ParseError::TooFewColumns {
            expected: MIN_COLUMNS,
            found: columns.len(),
        });
    }

    let gene_id = required(&columns, COL_GENE, "DB object id")?.to_string();
    let term_id = local_part(required(&columns, COL_TERM, "GO id")?, "GO id")?;
    let evidence_code = local_part(required(&columns, COL_EVIDENCE, "evidence code")?, "evidence code")?;
    let assigned_by = required(&columns, COL_ASSIGNED_BY, "assigned by")?.to_string();
    let date_curated = columns[COL_DATE].trim().to_string();

    let mut references = Vec::new();
    for raw in split_multi(required(&columns, COL_REFERENCE, "reference")?) {
        let reference = Reference::parse(&raw).ok_or(ParseError::MissingPrefix {
            field: "reference",
            value: raw.clone(),
        })?;
        references.push(reference);
    }
    let mut references = references.into_iter();
    let reference = references.next().ok_or(ParseError::EmptyField { field: "reference" })?;

    let (extensions, dropped_extensions) = match columns.get(COL_EXTENSION) {
        Some(field) => parse_extensions(field),
        None => (Vec::new(), Vec::new()),
    };

    let mut record = AnnotationRecord {
        gene_id,
        term_id,
        evidence_code,
        assigned_by,
        date_curated,
        reference,
        extra_references: references.collect(),
        qualifiers: split_multi(columns[COL_QUALIFIER]),
        with_from: split_multi(columns[COL_WITH_FROM]),
        extensions,
        digest: String::new(),
        rank: 0,
    };
    record.digest = record.compute_digest();

    Ok(ParsedLine::Annotation {
        record,
        dropped_extensions,
    })
}

/// Batch-scoped normalizer: parses lines and allocates ranks.
///
/// The n-th occurrence (0-based) of a (gene, term, first reference) triple
/// in the batch gets rank n.
#[derive(Debug, Default)]
pub struct RecordNormalizer {
    ranks: HashMap<String, usize>,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, line: &str) -> Result<ParsedLine, ParseError> {
        let mut parsed = parse_line(line)?;
        if let ParsedLine::Annotation { record, .. } = &mut parsed {
            let next = self.ranks.entry(record.rank_key()).or_insert(0);
            record.rank = *next;
            *next += 1;
        }
        Ok(parsed)
    }

    /// Forget all rank counters.
    pub fn reset(&mut self) {
        self.ranks.clear();
    }
}
