//! Content digests used as identity keys

use super::record::Reference;
use sha2::{Digest, Sha256};

/// Hash the concatenation of `parts` (no separators) as lower-case hex.
fn digest_of(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Change-detection key of an annotation.
///
/// Must stay byte-identical between staging and the comparison against
/// loaded rows: both sides call this function with local ids (no `GO:` or
/// `ECO:` prefix).
pub fn record_digest(gene_id: &str, term_id: &str, evidence_code: &str, assigned_by: &str) -> String {
    digest_of(&[gene_id, term_id, evidence_code, assigned_by])
}

/// Key of the per-batch rank counter for a (gene, term, reference) triple.
pub fn rank_digest(gene_id: &str, term_id: &str, reference: &Reference) -> String {
    digest_of(&[gene_id, term_id, &reference.id, &reference.namespace])
}

/// Identity of a synthetic term for (original term × relationship × target).
pub fn anon_term_digest(original_term: &str, relationship: &str, namespace: &str, local_id: &str) -> String {
    digest_of(&[original_term, relationship, namespace, local_id])
}
