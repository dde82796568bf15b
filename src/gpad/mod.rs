//! GPAD record normalization
//!
//! Turns GPAD 1.1 lines into canonical [`AnnotationRecord`]s. Each record
//! carries the two digests the rest of the loader depends on:
//!
//! - the record digest (gene, term, evidence, assigned-by), which links
//!   satellite rows to their parent and drives change detection
//! - the rank digest (gene, term, first reference), which keys the per-batch
//!   rank counter

mod digest;
mod parse;
mod record;

pub use digest::{anon_term_digest, rank_digest, record_digest};
pub use parse::{parse_extensions, parse_line, ParseError, ParsedLine, RecordNormalizer, MIN_COLUMNS};
pub use record::{AnnotationRecord, ExtensionEntry, Reference};
