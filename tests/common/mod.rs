//! Common test utilities for loader integration tests
//!
//! Provides an in-memory store seeded with the genes, publications and
//! ontology terms referenced by the GPAD files under `tests/data`, plus
//! row-count helpers for asserting on the resulting Chado tables.

#![allow(dead_code)]

pub mod fixture;

pub use fixture::{count, count_where, data_path, seeded_store, seed_fixtures, GENES, GO_TERMS};
