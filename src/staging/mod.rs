//! Staging buffer and bulk materializer
//!
//! Parsed records are buffered per logical staging table in input order and
//! flushed into temporary tables in one savepoint. Everything downstream
//! (change detection, term synthesis, merge) reads the staged rows back.

mod buffer;
mod staged;

pub use buffer::{StagingBuffer, StagingRow, StagingTable};
pub use staged::{read_staged, StagedAnnotation};
