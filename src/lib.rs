//! gpad-chado: incremental GPAD annotation loader for Chado
//!
//! Loads GPAD 1.1 gene-ontology annotations into a Chado database,
//! classifying each record as new or updated by a content digest rather
//! than a surrogate key, and turning annotation extensions into synthetic
//! ontology terms.
//!
//! # Pipeline
//!
//! - **Stage**: lines are normalized into records and bulk-inserted into
//!   temporary staging tables
//! - **Detect**: the namespace is either loaded fresh, or merged by
//!   comparing digests of staged and loaded annotations
//! - **Synthesize**: one anonymous term per distinct
//!   (term, relationship, target) extension tuple
//! - **Apply**: new linkages are inserted, updated ones have their
//!   properties replaced
//!
//! # Example
//!
//! ```
//! use gpad_chado::{ChadoStore, GpadLoader, LoaderConfig, OpenStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(ChadoStore::open_in_memory().unwrap());
//! let loader = GpadLoader::new(store, LoaderConfig::default());
//! let report = loader.load_reader("!gpa-version: 1.1\n".as_bytes()).unwrap();
//! assert_eq!(report.staged, 0);
//! ```

pub mod cache;
pub mod catalog;
pub mod chado;
pub mod config;
pub mod gpad;
mod loader;
pub mod report;
pub mod staging;
pub mod storage;

pub use cache::KeyCache;
pub use catalog::{CatalogError, NamedStatements, Statement, StatementCatalog};
pub use chado::{LoadMode, PropertyCounts, PropertyKind, SynthesisReport};
pub use config::{ConfigError, LoaderConfig};
pub use gpad::{AnnotationRecord, ExtensionEntry, ParseError, Reference};
pub use loader::{GpadLoader, LoadError, LoadFailure};
pub use report::{LoadReport, Phase, RowIssue};
pub use staging::StagingBuffer;
pub use storage::{ChadoStore, OpenStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
