//! Loader configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Names of the vocabularies and databases a load reads and writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Annotation namespace; also the cv holding the property type terms
    /// (`qualifier`, `date`, `source`, `with`)
    pub namespace: String,
    /// Database of the annotated ontology terms
    pub term_db: String,
    /// cv and db of evidence code terms
    pub evidence_cv: String,
    pub evidence_db: String,
    /// cv and db of synthesized extension terms
    pub anon_cv: String,
    pub anon_db: String,
    /// cv for extension relationship terms
    pub relation_cv: String,
    /// cv holding the `is_a` relationship term
    pub is_a_cv: String,
    /// db for dbxrefs of terms the loader creates by name
    pub internal_db: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            namespace: "gene_ontology_association".to_string(),
            term_db: "GO".to_string(),
            evidence_cv: "eco".to_string(),
            evidence_db: "ECO".to_string(),
            anon_cv: "annotation extension terms".to_string(),
            anon_db: "dictyBase".to_string(),
            relation_cv: "go/extensions/gorel".to_string(),
            is_a_cv: "ro".to_string(),
            internal_db: "internal".to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(LoaderConfig::from_yaml("").unwrap(), LoaderConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = LoaderConfig::from_yaml("namespace: dicty_go\nanon_db: DDB\n").unwrap();
        assert_eq!(config.namespace, "dicty_go");
        assert_eq!(config.anon_db, "DDB");
        assert_eq!(config.anon_cv, "annotation extension terms");
        assert_eq!(config.evidence_cv, "eco");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loader.yaml");
        std::fs::write(&path, "relation_cv: gorel\n").unwrap();
        let config = LoaderConfig::from_file(&path).unwrap();
        assert_eq!(config.relation_cv, "gorel");

        assert!(matches!(
            LoaderConfig::from_file(dir.path().join("missing.yaml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(LoaderConfig::from_yaml("namespace: [1, 2"), Err(ConfigError::Parse(_))));
    }
}
