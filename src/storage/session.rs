//! A locked connection paired with the statement catalog
//!
//! Every component of a load talks to the store through a `Session`. It
//! resolves [`Statement`]s through the catalog, binds parameters and tags
//! failures with the statement that raised them.

use super::traits::{StorageError, StorageResult};
use crate::catalog::{Statement, StatementCatalog};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Params, Row};

/// SQLite's default bound-parameter limit on older builds
const MAX_BIND_PARAMS: usize = 999;

pub struct Session<'a> {
    conn: &'a Connection,
    catalog: &'a dyn StatementCatalog,
}

/// Reject anything that is not a plain SQL identifier.
pub(crate) fn check_identifier(name: &str) -> StorageResult<&str> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

impl<'a> Session<'a> {
    pub(crate) fn new(conn: &'a Connection, catalog: &'a dyn StatementCatalog) -> Self {
        Self { conn, catalog }
    }

    /// SQL text of a statement
    pub fn sql(&self, statement: Statement) -> StorageResult<&'a str> {
        Ok(self.catalog.sql(statement)?)
    }

    fn tag(statement: Statement) -> impl FnOnce(rusqlite::Error) -> StorageError {
        move |source| StorageError::Statement { statement, source }
    }

    /// Run a single-statement write, returning the affected row count
    pub fn execute<P: Params>(&self, statement: Statement, params: P) -> StorageResult<usize> {
        let sql = self.sql(statement)?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(Self::tag(statement))?;
        stmt.execute(params).map_err(Self::tag(statement))
    }

    /// Run a multi-statement script (DDL) without parameters
    pub fn execute_batch(&self, statement: Statement) -> StorageResult<()> {
        let sql = self.sql(statement)?;
        self.conn.execute_batch(sql).map_err(Self::tag(statement))
    }

    /// Run an INSERT and return the new row id
    pub fn insert<P: Params>(&self, statement: Statement, params: P) -> StorageResult<i64> {
        self.execute(statement, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// First row of a query, if any
    pub fn query_opt<T, P, F>(&self, statement: Statement, params: P, f: F) -> StorageResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = self.sql(statement)?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(Self::tag(statement))?;
        stmt.query_row(params, f).optional().map_err(Self::tag(statement))
    }

    /// Every row of a query
    pub fn query_map<T, P, F>(&self, statement: Statement, params: P, f: F) -> StorageResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let sql = self.sql(statement)?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(Self::tag(statement))?;
        let rows = stmt.query_map(params, f).map_err(Self::tag(statement))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Self::tag(statement))
    }

    /// Single integer result (counts, next rank)
    pub fn query_i64<P: Params>(&self, statement: Statement, params: P) -> StorageResult<i64> {
        let sql = self.sql(statement)?;
        let mut stmt = self.conn.prepare_cached(sql).map_err(Self::tag(statement))?;
        stmt.query_row(params, |row| row.get(0)).map_err(Self::tag(statement))
    }

    /// Multi-row parameterized INSERT of `rows` into `table`.
    ///
    /// Rows are chunked so no statement binds more than [`MAX_BIND_PARAMS`]
    /// values. Returns the number of rows inserted.
    pub fn insert_rows(&self, table: &str, columns: &[&str], rows: &[Vec<Value>]) -> StorageResult<usize> {
        if columns.is_empty() || rows.is_empty() {
            return Ok(0);
        }
        let table = check_identifier(table)?;
        for column in columns {
            check_identifier(column)?;
        }

        let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
        let rows_per_chunk = (MAX_BIND_PARAMS / columns.len()).max(1);
        let mut inserted = 0;

        for chunk in rows.chunks(rows_per_chunk) {
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                table,
                columns.join(", "),
                vec![placeholders.as_str(); chunk.len()].join(", ")
            );
            let values = chunk.iter().flat_map(|row| row.iter());
            inserted += self.conn.execute(&sql, params_from_iter(values))?;
        }
        Ok(inserted)
    }

    pub fn savepoint(&self, name: &str) -> StorageResult<()> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", check_identifier(name)?))?;
        Ok(())
    }

    pub fn release(&self, name: &str) -> StorageResult<()> {
        self.conn.execute_batch(&format!("RELEASE {}", check_identifier(name)?))?;
        Ok(())
    }

    /// Undo everything since `savepoint(name)` and drop the savepoint
    pub fn rollback_to(&self, name: &str) -> StorageResult<()> {
        let name = check_identifier(name)?;
        self.conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
        Ok(())
    }

    /// Run `f` inside a savepoint: released on success, rolled back on error.
    pub fn atomically<T, E, F>(&self, name: &str, f: F) -> Result<T, E>
    where
        E: From<StorageError>,
        F: FnOnce(&Session<'a>) -> Result<T, E>,
    {
        self.savepoint(name)?;
        match f(self) {
            Ok(value) => {
                self.release(name)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback_to(name) {
                    tracing::warn!("Rollback of savepoint {} failed: {}", name, rollback);
                }
                Err(err)
            }
        }
    }
}
