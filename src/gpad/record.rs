//! Canonical annotation records

use super::digest::{rank_digest, record_digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A publication reference, normalized to (local id, namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    /// `PubMed` for `PMID:` references, otherwise the prefix as written
    pub namespace: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
        }
    }

    /// Parse `NS:id`. Returns `None` when the prefix or id is missing.
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, id) = raw.trim().split_once(':')?;
        if prefix.is_empty() || id.is_empty() {
            return None;
        }
        let namespace = if prefix == "PMID" { "PubMed" } else { prefix };
        Some(Self::new(id, namespace))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// One `relation(namespace:id)` annotation extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtensionEntry {
    pub relationship: String,
    pub namespace: String,
    pub local_id: String,
    /// Position of the token in the extension column
    pub rank: usize,
}

impl ExtensionEntry {
    /// Parse a single extension token. The whole token must match
    /// `relation(namespace:local_id)`.
    pub fn parse(token: &str, rank: usize) -> Option<Self> {
        let (relationship, rest) = token.trim().split_once('(')?;
        let target = rest.strip_suffix(')')?;
        let (namespace, local_id) = target.split_once(':')?;

        let relation_ok = !relationship.is_empty()
            && relationship
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        let target_ok = |s: &str| {
            !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '(' || c == ')')
        };
        if !relation_ok || !target_ok(namespace) || !target_ok(local_id) {
            return None;
        }

        Some(Self {
            relationship: relationship.to_string(),
            namespace: namespace.to_string(),
            local_id: local_id.to_string(),
            rank,
        })
    }

    /// The target identifier as `namespace:local_id`
    pub fn target(&self) -> String {
        format!("{}:{}", self.namespace, self.local_id)
    }
}

impl fmt::Display for ExtensionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.relationship, self.namespace, self.local_id)
    }
}

/// A normalized GPAD annotation plus its satellite values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// DB object id (column 2), e.g. `DDB_G0272003`
    pub gene_id: String,
    /// Local part of the ontology term id (`0000015` for `GO:0000015`)
    pub term_id: String,
    /// Local part of the evidence id (`0000256` for `ECO:0000256`)
    pub evidence_code: String,
    pub assigned_by: String,
    pub date_curated: String,
    /// First reference; anchors the linkage row
    pub reference: Reference,
    pub extra_references: Vec<Reference>,
    pub qualifiers: Vec<String>,
    pub with_from: Vec<String>,
    pub extensions: Vec<ExtensionEntry>,
    pub digest: String,
    pub rank: usize,
}

impl AnnotationRecord {
    /// Recompute the change-detection digest from the key fields.
    pub fn compute_digest(&self) -> String {
        record_digest(&self.gene_id, &self.term_id, &self.evidence_code, &self.assigned_by)
    }

    /// Key of the per-batch rank counter.
    pub fn rank_key(&self) -> String {
        rank_digest(&self.gene_id, &self.term_id, &self.reference)
    }

    /// True when any qualifier negates the annotation.
    pub fn is_not(&self) -> bool {
        self.qualifiers.iter().any(|q| q.eq_ignore_ascii_case("not"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_parse_normalizes_pmid() {
        let r = Reference::parse("PMID:21515711").unwrap();
        assert_eq!(r, Reference::new("21515711", "PubMed"));
        assert_eq!(r.to_string(), "PubMed:21515711");

        let r = Reference::parse("GO_REF:0000002").unwrap();
        assert_eq!(r, Reference::new("0000002", "GO_REF"));
    }

    #[test]
    fn test_reference_parse_rejects_missing_prefix() {
        assert!(Reference::parse("0000002").is_none());
        assert!(Reference::parse(":0000002").is_none());
        assert!(Reference::parse("GO_REF:").is_none());
    }

    #[test]
    fn test_extension_parse() {
        let e = ExtensionEntry::parse("has_regulation_target(UniProtKB:Q54BD4)", 0).unwrap();
        assert_eq!(e.relationship, "has_regulation_target");
        assert_eq!(e.namespace, "UniProtKB");
        assert_eq!(e.local_id, "Q54BD4");
        assert_eq!(e.target(), "UniProtKB:Q54BD4");
        assert_eq!(e.to_string(), "has_regulation_target(UniProtKB:Q54BD4)");
    }

    #[test]
    fn test_extension_parse_keeps_colons_in_local_id() {
        let e = ExtensionEntry::parse("occurs_in(MGI:MGI:104874)", 3).unwrap();
        assert_eq!(e.namespace, "MGI");
        assert_eq!(e.local_id, "MGI:104874");
        assert_eq!(e.rank, 3);
    }

    #[test]
    fn test_extension_parse_rejects_malformed() {
        for token in [
            "has_regulation_target",
            "has_regulation_target(Q54BD4)",
            "has_regulation_target(UniProtKB:Q54BD4",
            "(UniProtKB:Q54BD4)",
            "has regulation(UniProtKB:Q54BD4)",
            "exists_during(GO:0000)extra",
        ] {
            assert!(ExtensionEntry::parse(token, 0).is_none(), "accepted {}", token);
        }
    }
}
