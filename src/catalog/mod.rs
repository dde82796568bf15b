//! Named statement catalog
//!
//! The loader never embeds SQL for its logical operations. Each operation is
//! a [`Statement`] resolved through a [`StatementCatalog`] at the point of
//! use, so a backend can ship its own dialect as a YAML file of
//! `name: sql` pairs.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// SQLite catalog bundled with the crate
const BUNDLED_SQLITE: &str = include_str!("../../sql/sqlite.yaml");

/// Errors raised while loading or consulting a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Statement not found in catalog: {0}")]
    StatementNotFound(&'static str),

    #[error("Catalog parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

macro_rules! statements {
    ($($variant:ident => $name:literal,)+) => {
        /// Logical operations the loader issues against the store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Statement {
            $($variant,)+
        }

        impl Statement {
            /// Every statement, in catalog order
            pub const ALL: &'static [Statement] = &[$(Statement::$variant,)+];

            /// Catalog key of this statement
            pub fn name(self) -> &'static str {
                match self {
                    $(Statement::$variant => $name,)+
                }
            }
        }
    };
}

statements! {
    CreateChadoSchema => "create_chado_schema",
    CreateStagingTables => "create_staging_tables",
    ResetStagingTables => "reset_staging_tables",
    SelectStagedGpads => "select_staged_gpads",
    SelectStagedQualifiers => "select_staged_qualifiers",
    SelectStagedWithfrom => "select_staged_withfrom",
    SelectStagedReferences => "select_staged_references",
    SelectStagedExtensions => "select_staged_extensions",
    CountAllGpadsFromChado => "count_all_gpads_from_chado",
    SelectAllGpadsFromChado => "select_all_gpads_from_chado",
    MarkGpadUpdate => "mark_gpad_update",
    SelectAnonCvterm => "select_anon_cvterm",
    UpdateTempWithAnonCvterm => "update_temp_with_anon_cvterm",
    FindDbId => "find_db_id",
    InsertDb => "insert_db",
    FindCvId => "find_cv_id",
    InsertCv => "insert_cv",
    FindDbxrefId => "find_dbxref_id",
    InsertDbxref => "insert_dbxref",
    FindCvtermId => "find_cvterm_id",
    FindCvtermIdByDbxref => "find_cvterm_id_by_dbxref",
    InsertCvterm => "insert_cvterm",
    InsertCvtermRelationship => "insert_cvterm_relationship",
    InsertCvtermprop => "insert_cvtermprop",
    InsertCvtermDbxref => "insert_cvterm_dbxref",
    FindFeatureId => "find_feature_id",
    FindPubId => "find_pub_id",
    NextFeatureCvtermRank => "next_feature_cvterm_rank",
    InsertFeatureCvterm => "insert_feature_cvterm",
    InsertFeatureCvtermprop => "insert_feature_cvtermprop",
    InsertFeatureCvtermPub => "insert_feature_cvterm_pub",
    UpdateFeatureCvtermIsNot => "update_feature_cvterm_is_not",
    SelectFeatureCvtermpropTypes => "select_feature_cvtermprop_types",
    CountFeatureCvtermPubs => "count_feature_cvterm_pubs",
    DeleteFeatureCvtermprops => "delete_feature_cvtermprops",
    DeleteFeatureCvtermPubs => "delete_feature_cvterm_pubs",
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of SQL text for each logical statement
pub trait StatementCatalog: Send + Sync {
    /// Look up the SQL for `statement`
    fn sql(&self, statement: Statement) -> CatalogResult<&str>;

    /// Statements this catalog cannot serve
    fn missing(&self) -> Vec<Statement> {
        Statement::ALL
            .iter()
            .copied()
            .filter(|s| self.sql(*s).is_err())
            .collect()
    }
}

/// Catalog backed by a `name: sql` map
#[derive(Debug, Clone, Default)]
pub struct NamedStatements {
    statements: HashMap<String, String>,
}

impl NamedStatements {
    /// The SQLite catalog shipped with the crate
    pub fn bundled() -> CatalogResult<Self> {
        Self::from_yaml(BUNDLED_SQLITE)
    }

    pub fn from_yaml(yaml: &str) -> CatalogResult<Self> {
        let raw: HashMap<String, String> = serde_yaml::from_str(yaml)?;
        let statements = raw
            .into_iter()
            .map(|(name, sql)| {
                let sql = sql.trim().trim_end_matches(';').trim_end().to_string();
                (name, sql)
            })
            .collect();
        Ok(Self { statements })
    }

    pub fn from_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Add or replace a statement
    pub fn with_statement(mut self, statement: Statement, sql: impl Into<String>) -> Self {
        self.statements.insert(statement.name().to_string(), sql.into());
        self
    }

    /// Remove a statement
    pub fn without_statement(mut self, statement: Statement) -> Self {
        self.statements.remove(statement.name());
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl StatementCatalog for NamedStatements {
    fn sql(&self, statement: Statement) -> CatalogResult<&str> {
        self.statements
            .get(statement.name())
            .map(String::as_str)
            .ok_or(CatalogError::StatementNotFound(statement.name()))
    }
}
