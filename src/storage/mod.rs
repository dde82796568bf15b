//! Storage layer
//!
//! `ChadoStore` owns the SQLite connection. All reads and writes go through a
//! [`Session`], which resolves named statements from the catalog.

mod session;
mod sqlite;
mod traits;

pub use session::Session;
pub use sqlite::{ChadoStore, NamespaceGuard};
pub use traits::{OpenStore, StorageError, StorageResult};
