//! In-memory row buffer and its flush into staging tables

use crate::catalog::Statement;
use crate::gpad::{AnnotationRecord, ParsedLine, RecordNormalizer};
use crate::report::{Phase, RowIssue};
use crate::storage::{Session, StorageResult};
use rusqlite::types::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use tracing::{debug, warn};

/// Logical staging tables, in flush order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StagingTable {
    Gpad,
    Qualifier,
    WithFrom,
    Reference,
    Extension,
}

impl StagingTable {
    pub const ALL: [StagingTable; 5] = [
        StagingTable::Gpad,
        StagingTable::Qualifier,
        StagingTable::WithFrom,
        StagingTable::Reference,
        StagingTable::Extension,
    ];

    /// Logical name used in reports
    pub fn name(self) -> &'static str {
        match self {
            StagingTable::Gpad => "gpad",
            StagingTable::Qualifier => "gpad_qualifier",
            StagingTable::WithFrom => "gpad_withfrom",
            StagingTable::Reference => "gpad_reference",
            StagingTable::Extension => "gpad_extension",
        }
    }

    /// Physical temporary table
    pub fn table(self) -> &'static str {
        match self {
            StagingTable::Gpad => "temp_gpad",
            StagingTable::Qualifier => "temp_gpad_qualifier",
            StagingTable::WithFrom => "temp_gpad_withfrom",
            StagingTable::Reference => "temp_gpad_reference",
            StagingTable::Extension => "temp_gpad_extension",
        }
    }
}

/// One staged row: (column, value) pairs
pub type StagingRow = Vec<(&'static str, Value)>;

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn rank(r: usize) -> Value {
    Value::Integer(r as i64)
}

/// Accumulates staging rows for one batch
#[derive(Debug, Default)]
pub struct StagingBuffer {
    normalizer: RecordNormalizer,
    rows: HashMap<StagingTable, Vec<StagingRow>>,
    records: usize,
    lines: usize,
    issues: Vec<RowIssue>,
}

impl StagingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one input line. Malformed lines and dropped extension tokens
    /// become issues; they never fail the batch.
    pub fn add_line(&mut self, line: &str) {
        self.lines += 1;
        match self.normalizer.normalize(line) {
            Ok(ParsedLine::Skipped) => {}
            Ok(ParsedLine::Annotation {
                record,
                dropped_extensions,
            }) => {
                for token in dropped_extensions {
                    debug!("Line {}: dropping extension {}", self.lines, token);
                    self.issues.push(RowIssue::at_line(
                        Phase::Stage,
                        self.lines,
                        token,
                        "extension does not match relation(namespace:id)",
                    ));
                }
                self.add_record(&record);
            }
            Err(e) => {
                warn!("Skipping line {}: {}", self.lines, e);
                self.issues
                    .push(RowIssue::at_line(Phase::Stage, self.lines, "line", e.to_string()));
            }
        }
    }

    /// Buffer every line of `reader`. Returns the number of lines read.
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        let before = self.lines;
        for line in reader.lines() {
            self.add_line(&line?);
        }
        Ok(self.lines - before)
    }

    /// Buffer an already-normalized record
    pub fn add_record(&mut self, record: &AnnotationRecord) {
        let digest = record.digest.as_str();

        self.push(
            StagingTable::Gpad,
            vec![
                ("digest", text(digest)),
                ("id", text(&record.gene_id)),
                ("goid", text(&record.term_id)),
                ("publication_id", text(&record.reference.id)),
                ("pubplace", text(&record.reference.namespace)),
                ("evidence_code", text(&record.evidence_code)),
                ("date_curated", text(&record.date_curated)),
                ("assigned_by", text(&record.assigned_by)),
                ("rank", rank(record.rank)),
            ],
        );

        for (i, qualifier) in record.qualifiers.iter().enumerate() {
            self.push(
                StagingTable::Qualifier,
                vec![("digest", text(digest)), ("qualifier", text(qualifier)), ("rank", rank(i))],
            );
        }

        for (i, value) in record.with_from.iter().enumerate() {
            self.push(
                StagingTable::WithFrom,
                vec![("digest", text(digest)), ("withfrom", text(value)), ("rank", rank(i))],
            );
        }

        // Position 0 of the reference column is the primary reference
        for (i, reference) in record.extra_references.iter().enumerate() {
            self.push(
                StagingTable::Reference,
                vec![
                    ("digest", text(digest)),
                    ("publication_id", text(&reference.id)),
                    ("pubplace", text(&reference.namespace)),
                    ("rank", rank(i + 1)),
                ],
            );
        }

        for entry in &record.extensions {
            self.push(
                StagingTable::Extension,
                vec![
                    ("digest", text(digest)),
                    ("relationship", text(&entry.relationship)),
                    ("db", text(&entry.namespace)),
                    ("id", text(&entry.local_id)),
                    ("rank", rank(entry.rank)),
                ],
            );
        }

        self.records += 1;
    }

    fn push(&mut self, table: StagingTable, row: StagingRow) {
        self.rows.entry(table).or_default().push(row);
    }

    pub fn rows(&self, table: StagingTable) -> &[StagingRow] {
        self.rows.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row_count(&self, table: StagingTable) -> usize {
        self.rows(table).len()
    }

    /// Row counts keyed by logical table name
    pub fn row_counts(&self) -> BTreeMap<String, usize> {
        StagingTable::ALL
            .iter()
            .map(|t| (t.name().to_string(), self.row_count(*t)))
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn issues(&self) -> &[RowIssue] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<RowIssue> {
        std::mem::take(&mut self.issues)
    }

    /// Write all buffered rows into the staging tables, replacing whatever
    /// they held. All or nothing.
    pub fn flush(&self, session: &Session<'_>) -> StorageResult<usize> {
        session.atomically("gpad_staging", |s| {
            s.execute_batch(Statement::CreateStagingTables)?;
            s.execute_batch(Statement::ResetStagingTables)?;

            let mut total = 0;
            for table in StagingTable::ALL {
                let rows = self.rows(table);
                let Some(first) = rows.first() else {
                    continue;
                };
                let columns: Vec<&str> = first.iter().map(|(column, _)| *column).collect();
                let values: Vec<Vec<Value>> = rows
                    .iter()
                    .map(|row| {
                        columns
                            .iter()
                            .map(|column| {
                                row.iter()
                                    .find(|(c, _)| c == column)
                                    .map(|(_, v)| v.clone())
                                    .unwrap_or(Value::Null)
                            })
                            .collect()
                    })
                    .collect();
                let inserted = s.insert_rows(table.table(), &columns, &values)?;
                debug!("Staged {} rows into {}", inserted, table.table());
                total += inserted;
            }
            Ok(total)
        })
    }
}
