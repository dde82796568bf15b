//! Load outcome reporting

use crate::chado::{LoadMode, PropertyCounts, PropertyKind, SynthesisReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Stage of a namespace load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Stage,
    Detect,
    Synthesize,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Stage => "stage",
            Phase::Detect => "detect",
            Phase::Synthesize => "synthesize",
            Phase::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// A row-level problem that did not abort the load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub phase: Phase,
    /// 1-based input line, when the issue comes from parsing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Record digest, extension token or term the issue concerns
    pub subject: String,
    pub reason: String,
}

impl RowIssue {
    pub fn at_line(phase: Phase, line: usize, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            phase,
            line: Some(line),
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn new(phase: Phase, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            phase,
            line: None,
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}: {}", self.phase, line, self.subject, self.reason),
            None => write!(f, "[{}] {}: {}", self.phase, self.subject, self.reason),
        }
    }
}

/// Summary of one namespace load
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub namespace: String,
    pub mode: LoadMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Annotation records staged from the input
    pub staged: usize,
    pub new: usize,
    pub updated: usize,
    /// Loaded annotations absent from this batch
    pub unchanged: usize,
    pub linkages_inserted: usize,
    pub records_skipped: usize,
    pub properties: BTreeMap<PropertyKind, PropertyCounts>,
    pub synthesis: SynthesisReport,
    /// Staged rows per staging table
    pub staging_rows: BTreeMap<String, usize>,
    pub issues: Vec<RowIssue>,
}

impl LoadReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Property rows written across all kinds: (inserted, replaced)
    pub fn property_totals(&self) -> (usize, usize) {
        self.properties
            .values()
            .fold((0, 0), |(i, r), c| (i + c.inserted, r + c.replaced))
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Namespace: {} ({})", self.namespace, self.mode)?;
        writeln!(f, "  Staged:     {}", self.staged)?;
        writeln!(f, "  New:        {}", self.new)?;
        writeln!(f, "  Updated:    {}", self.updated)?;
        writeln!(f, "  Unchanged:  {}", self.unchanged)?;
        writeln!(f, "  Linkages:   {}", self.linkages_inserted)?;
        let (inserted, replaced) = self.property_totals();
        let unchanged: usize = self.properties.values().map(|c| c.unchanged).sum();
        writeln!(
            f,
            "  Properties: {} inserted, {} replaced, {} unchanged",
            inserted, replaced, unchanged
        )?;
        writeln!(
            f,
            "  Extension terms: {} created, {} reused, {} unresolved",
            self.synthesis.created, self.synthesis.reused, self.synthesis.unresolved
        )?;
        if !self.issues.is_empty() {
            writeln!(f, "  Issues:     {}", self.issues.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Synthesize.to_string(), "synthesize");
        assert_eq!(serde_json::to_string(&Phase::Apply).unwrap(), "\"apply\"");
    }

    #[test]
    fn test_issue_display() {
        let issue = RowIssue::at_line(Phase::Stage, 4, "has_regulation_target(Q54BD4)", "malformed extension");
        assert_eq!(issue.to_string(), "[stage] line 4: has_regulation_target(Q54BD4): malformed extension");

        let issue = RowIssue::new(Phase::Apply, "abc", "feature not found");
        assert_eq!(issue.to_string(), "[apply] abc: feature not found");
        let json = serde_json::to_value(&issue).unwrap();
        assert!(json.get("line").is_none());
    }
}
