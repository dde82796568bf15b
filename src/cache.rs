//! Surrogate-key cache
//!
//! Every vocabulary and entity lookup in a load (db, cv, cvterm, dbxref,
//! feature, pub) goes through one `KeyCache`. Hits skip the database; misses
//! run the supplied lookup and, for resolve-or-create, the supplied insert.
//!
//! Ids handed out inside a transaction that later rolls back are stale, so
//! the loader clears the cache whenever a load fails.

use crate::storage::StorageResult;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What a cached id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Db,
    Cv,
    /// cvterm by (cv name, term name)
    Cvterm,
    /// cvterm by (db name, accession)
    TermAccession,
    Dbxref,
    Feature,
    Pub,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: EntityKind,
    name: String,
}

impl CacheKey {
    fn new(kind: EntityKind, parts: &[&str]) -> Self {
        Self {
            kind,
            name: parts.join("\t"),
        }
    }

    pub fn db(name: &str) -> Self {
        Self::new(EntityKind::Db, &[name])
    }

    pub fn cv(name: &str) -> Self {
        Self::new(EntityKind::Cv, &[name])
    }

    pub fn cvterm(cv: &str, name: &str) -> Self {
        Self::new(EntityKind::Cvterm, &[cv, name])
    }

    pub fn term_accession(db: &str, accession: &str) -> Self {
        Self::new(EntityKind::TermAccession, &[db, accession])
    }

    pub fn dbxref(db: &str, accession: &str) -> Self {
        Self::new(EntityKind::Dbxref, &[db, accession])
    }

    pub fn feature(uniquename: &str) -> Self {
        Self::new(EntityKind::Feature, &[uniquename])
    }

    pub fn publication(uniquename: &str, pubplace: &str) -> Self {
        Self::new(EntityKind::Pub, &[uniquename, pubplace])
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

/// Outcome of a resolve-or-create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: i64,
    /// True when the row was inserted by this call
    pub created: bool,
}

#[derive(Debug, Default)]
pub struct KeyCache {
    ids: RwLock<HashMap<CacheKey, i64>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, i64>> {
        self.ids.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, i64>> {
        self.ids.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<i64> {
        self.read().get(key).copied()
    }

    pub fn insert(&self, key: CacheKey, id: i64) {
        self.write().insert(key, id);
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Cached id, or the result of `lookup`. Misses are not cached.
    pub fn resolve<L>(&self, key: CacheKey, lookup: L) -> StorageResult<Option<i64>>
    where
        L: FnOnce() -> StorageResult<Option<i64>>,
    {
        if let Some(id) = self.get(&key) {
            return Ok(Some(id));
        }
        let found = lookup()?;
        if let Some(id) = found {
            self.insert(key, id);
        }
        Ok(found)
    }

    /// Cached id, else `lookup`, else `create`.
    pub fn resolve_or_create<L, C>(&self, key: CacheKey, lookup: L, create: C) -> StorageResult<Resolution>
    where
        L: FnOnce() -> StorageResult<Option<i64>>,
        C: FnOnce() -> StorageResult<i64>,
    {
        if let Some(id) = self.get(&key) {
            return Ok(Resolution { id, created: false });
        }
        let resolution = match lookup()? {
            Some(id) => Resolution { id, created: false },
            None => Resolution {
                id: create()?,
                created: true,
            },
        };
        self.insert(key, resolution.id);
        Ok(resolution)
    }
}
