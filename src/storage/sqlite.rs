//! SQLite-backed Chado store

use super::session::Session;
use super::traits::{OpenStore, StorageError, StorageResult};
use crate::catalog::{NamedStatements, Statement, StatementCatalog};
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite-backed Chado store
///
/// Owns a single connection behind a mutex and the statement catalog used to
/// talk to it. Also tracks which annotation namespaces are mid-load so two
/// loads of the same namespace cannot interleave.
pub struct ChadoStore {
    conn: Mutex<Connection>,
    catalog: Arc<dyn StatementCatalog>,
    loading: Mutex<HashSet<String>>,
}

impl ChadoStore {
    /// Open a store at `path` with a custom catalog. The schema is not
    /// deployed; call [`ChadoStore::deploy_schema`] for a fresh database.
    pub fn open_with_catalog(path: impl AsRef<Path>, catalog: Arc<dyn StatementCatalog>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn, catalog))
    }

    /// In-memory store with a custom catalog
    pub fn open_in_memory_with_catalog(catalog: Arc<dyn StatementCatalog>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn, catalog))
    }

    fn from_connection(conn: Connection, catalog: Arc<dyn StatementCatalog>) -> Self {
        Self {
            conn: Mutex::new(conn),
            catalog,
            loading: Mutex::new(HashSet::new()),
        }
    }

    fn bundled_catalog() -> StorageResult<Arc<dyn StatementCatalog>> {
        Ok(Arc::new(NamedStatements::bundled()?))
    }

    pub fn catalog(&self) -> &Arc<dyn StatementCatalog> {
        &self.catalog
    }

    /// Create the Chado tables this loader writes to, if they do not exist
    pub fn deploy_schema(&self) -> StorageResult<()> {
        self.with_session(|session| session.execute_batch(Statement::CreateChadoSchema))?;
        debug!("Chado schema deployed");
        Ok(())
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_session<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&Session<'_>) -> Result<T, E>,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let session = Session::new(&conn, self.catalog.as_ref());
        f(&session)
    }

    /// Raw connection access for seeding and inspection outside the catalog
    pub fn with_connection<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(&conn)?)
    }

    /// Claim `namespace` for a load. Fails with `NamespaceBusy` while another
    /// guard for the same namespace is alive.
    pub fn begin_load(&self, namespace: &str) -> StorageResult<NamespaceGuard<'_>> {
        let mut loading = self.loading.lock().map_err(|_| StorageError::LockPoisoned)?;
        if !loading.insert(namespace.to_string()) {
            return Err(StorageError::NamespaceBusy(namespace.to_string()));
        }
        info!("Loading namespace {}", namespace);
        Ok(NamespaceGuard {
            store: self,
            namespace: namespace.to_string(),
        })
    }

    /// Namespaces currently being loaded
    pub fn loading_namespaces(&self) -> Vec<String> {
        match self.loading.lock() {
            Ok(loading) => loading.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl OpenStore for ChadoStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let store = Self::open_with_catalog(path, Self::bundled_catalog()?)?;
        store.deploy_schema()?;
        Ok(store)
    }

    fn open_in_memory() -> StorageResult<Self> {
        let store = Self::open_in_memory_with_catalog(Self::bundled_catalog()?)?;
        store.deploy_schema()?;
        Ok(store)
    }
}

/// Releases a namespace claimed by [`ChadoStore::begin_load`] on drop
pub struct NamespaceGuard<'a> {
    store: &'a ChadoStore,
    namespace: String,
}

impl NamespaceGuard<'_> {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Drop for NamespaceGuard<'_> {
    fn drop(&mut self) {
        let mut loading = match self.store.loading.lock() {
            Ok(loading) => loading,
            Err(poisoned) => poisoned.into_inner(),
        };
        loading.remove(&self.namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn create_test_store() -> ChadoStore {
        ChadoStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_schema_is_deployed() {
        let store = create_test_store();
        let found = store
            .with_session(|s| s.query_opt(Statement::FindDbId, params!["GO"], |r| r.get::<_, i64>(0)))
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_deploy_schema_is_idempotent() {
        let store = create_test_store();
        store.deploy_schema().unwrap();
        store.deploy_schema().unwrap();
    }

    #[test]
    fn test_namespace_guard() {
        let store = create_test_store();
        let guard = store.begin_load("gene_ontology_association").unwrap();
        assert_eq!(guard.namespace(), "gene_ontology_association");

        match store.begin_load("gene_ontology_association") {
            Err(StorageError::NamespaceBusy(ns)) => assert_eq!(ns, "gene_ontology_association"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("second guard for the same namespace"),
        }
        // Other namespaces are independent
        let other = store.begin_load("other").unwrap();
        drop(other);

        drop(guard);
        assert!(store.loading_namespaces().is_empty());
        store.begin_load("gene_ontology_association").unwrap();
    }

    #[test]
    fn test_open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chado.db");
        let store = ChadoStore::open(&path).unwrap();
        assert!(path.exists());
        drop(store);

        // Reopening an existing database is fine
        ChadoStore::open(&path).unwrap();
    }
}
