//! Storage trait definitions

use crate::catalog::{CatalogError, Statement};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Statement {statement} failed: {source}")]
    Statement {
        statement: Statement,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Connection lock poisoned")]
    LockPoisoned,

    #[error("Namespace is already being loaded: {0}")]
    NamespaceBusy(String),

    #[error("Record {record}: {source}")]
    Record {
        record: String,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Wrap this error with the digest (or other key) of the record being written
    pub fn for_record(self, record: impl Into<String>) -> Self {
        StorageError::Record {
            record: record.into(),
            source: Box::new(self),
        }
    }

    /// The catalog statement that failed, when known
    pub fn statement(&self) -> Option<Statement> {
        match self {
            StorageError::Statement { statement, .. } => Some(*statement),
            StorageError::Record { source, .. } => source.statement(),
            _ => None,
        }
    }

    /// The record key attached by [`StorageError::for_record`]
    pub fn record(&self) -> Option<&str> {
        match self {
            StorageError::Record { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Errors from the database engine itself. Retrying the whole load may
    /// succeed; catalog, identifier and concurrency errors will not.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(_) | StorageError::Statement { .. } | StorageError::Io(_) => true,
            StorageError::Record { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Stores that can be opened on a path or in memory
pub trait OpenStore: Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
