//! Cached vocabulary and entity resolution
//!
//! `Resolver` is the single place that turns names into Chado surrogate
//! keys. Lookups of things the loader never creates (features, pubs,
//! ontology terms by accession) return `None` when absent; vocabulary the
//! loader owns (dbs, cvs, relation and property terms) is created on demand.

use crate::cache::{CacheKey, KeyCache, Resolution};
use crate::catalog::Statement;
use crate::storage::{Session, StorageResult};
use rusqlite::params;

pub struct Resolver<'s, 'c> {
    session: &'s Session<'c>,
    cache: &'s KeyCache,
    /// db for dbxrefs of terms created by name
    internal_db: &'s str,
}

impl<'s, 'c> Resolver<'s, 'c> {
    pub fn new(session: &'s Session<'c>, cache: &'s KeyCache, internal_db: &'s str) -> Self {
        Self {
            session,
            cache,
            internal_db,
        }
    }

    pub fn session(&self) -> &'s Session<'c> {
        self.session
    }

    pub fn db(&self, name: &str) -> StorageResult<Resolution> {
        let s = self.session;
        self.cache.resolve_or_create(
            CacheKey::db(name),
            || s.query_opt(Statement::FindDbId, params![name], |r| r.get(0)),
            || s.insert(Statement::InsertDb, params![name]),
        )
    }

    pub fn cv(&self, name: &str) -> StorageResult<Resolution> {
        let s = self.session;
        self.cache.resolve_or_create(
            CacheKey::cv(name),
            || s.query_opt(Statement::FindCvId, params![name], |r| r.get(0)),
            || s.insert(Statement::InsertCv, params![name]),
        )
    }

    pub fn dbxref(&self, db: &str, accession: &str) -> StorageResult<Resolution> {
        let db_id = self.db(db)?.id;
        let s = self.session;
        self.cache.resolve_or_create(
            CacheKey::dbxref(db, accession),
            || s.query_opt(Statement::FindDbxrefId, params![db_id, accession], |r| r.get(0)),
            || s.insert(Statement::InsertDbxref, params![db_id, accession]),
        )
    }

    /// Existing term by (cv, name)
    pub fn find_term(&self, cv: &str, name: &str) -> StorageResult<Option<i64>> {
        let s = self.session;
        self.cache.resolve(CacheKey::cvterm(cv, name), || {
            s.query_opt(Statement::FindCvtermId, params![cv, name], |r| r.get(0))
        })
    }

    /// Term by (cv, name), created with an internal dbxref when missing
    pub fn term(&self, cv: &str, name: &str, is_relationship: bool) -> StorageResult<Resolution> {
        let s = self.session;
        self.cache.resolve_or_create(
            CacheKey::cvterm(cv, name),
            || s.query_opt(Statement::FindCvtermId, params![cv, name], |r| r.get(0)),
            || {
                let cv_id = self.cv(cv)?.id;
                let dbxref_id = self.dbxref(self.internal_db, &format!("{}:{}", cv, name))?.id;
                s.insert(
                    Statement::InsertCvterm,
                    params![cv_id, name, Option::<&str>::None, dbxref_id, is_relationship],
                )
            },
        )
    }

    /// Create a term with an explicit dbxref and definition.
    pub fn create_term(&self, cv: &str, name: &str, definition: &str, dbxref_id: i64) -> StorageResult<i64> {
        let cv_id = self.cv(cv)?.id;
        let id = self.session.insert(
            Statement::InsertCvterm,
            params![cv_id, name, definition, dbxref_id, false],
        )?;
        self.cache.insert(CacheKey::cvterm(cv, name), id);
        Ok(id)
    }

    /// Existing term by the accession of its primary dbxref
    pub fn term_by_accession(&self, db: &str, accession: &str) -> StorageResult<Option<i64>> {
        let s = self.session;
        self.cache.resolve(CacheKey::term_accession(db, accession), || {
            s.query_opt(Statement::FindCvtermIdByDbxref, params![db, accession], |r| r.get(0))
        })
    }

    pub fn feature(&self, uniquename: &str) -> StorageResult<Option<i64>> {
        let s = self.session;
        self.cache.resolve(CacheKey::feature(uniquename), || {
            s.query_opt(Statement::FindFeatureId, params![uniquename], |r| r.get(0))
        })
    }

    pub fn publication(&self, uniquename: &str, pubplace: &str) -> StorageResult<Option<i64>> {
        let s = self.session;
        self.cache.resolve(CacheKey::publication(uniquename, pubplace), || {
            s.query_opt(Statement::FindPubId, params![uniquename, pubplace], |r| r.get(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ChadoStore, OpenStore};

    #[test]
    fn test_term_created_once_and_cached() {
        let store = ChadoStore::open_in_memory().unwrap();
        let cache = KeyCache::new();

        store
            .with_session(|s| -> StorageResult<()> {
                let resolver = Resolver::new(s, &cache, "internal");
                let first = resolver.term("ro", "is_a", true)?;
                assert!(first.created);
                let second = resolver.term("ro", "is_a", true)?;
                assert_eq!(second, Resolution { id: first.id, created: false });

                // A fresh cache finds the stored row
                let other_cache = KeyCache::new();
                let fresh = Resolver::new(s, &other_cache, "internal");
                assert_eq!(fresh.find_term("ro", "is_a")?, Some(first.id));
                assert_eq!(fresh.term_by_accession("internal", "ro:is_a")?, Some(first.id));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_absent_entities_resolve_to_none() {
        let store = ChadoStore::open_in_memory().unwrap();
        let cache = KeyCache::new();

        store
            .with_session(|s| -> StorageResult<()> {
                let resolver = Resolver::new(s, &cache, "internal");
                assert_eq!(resolver.feature("DDB_G0000000")?, None);
                assert_eq!(resolver.publication("1", "PubMed")?, None);
                assert_eq!(resolver.term_by_accession("GO", "0000015")?, None);
                assert_eq!(resolver.find_term("eco", "IEA")?, None);
                Ok(())
            })
            .unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_dbxref_resolves_db_first() {
        let store = ChadoStore::open_in_memory().unwrap();
        let cache = KeyCache::new();

        store
            .with_session(|s| -> StorageResult<()> {
                let resolver = Resolver::new(s, &cache, "internal");
                let x = resolver.dbxref("UniProtKB", "Q54BD4")?;
                assert!(x.created);
                assert!(cache.get(&CacheKey::db("UniProtKB")).is_some());
                let y = resolver.dbxref("UniProtKB", "Q54BD4")?;
                assert_eq!(x.id, y.id);
                assert!(!y.created);
                Ok(())
            })
            .unwrap();
    }
}
