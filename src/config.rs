use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::SchemaError;
use crate::schema::SchemaRegistry;

pub const DATABASE_URL_ENV: &str = "ARCHGRAPH_DATABASE_URL";
pub const SCHEMA_ENV: &str = "ARCHGRAPH_SCHEMA";

/// Database location that selects the in-memory graph store.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Engine settings, read from a YAML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database_url: String,
    /// YAML schema definition; the embedded Enterprise Architecture schema
    /// is used when unset.
    pub schema_path: Option<PathBuf>,
    /// Page size applied when a connection query gives no `first`.
    pub default_page_size: Option<usize>,
    /// Upper bound for `first`; larger requests are clamped.
    pub max_page_size: Option<usize>,
    pub max_filter_depth: usize,
    pub request_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://archgraph.db?mode=rwc".to_string(),
            schema_path: None,
            default_page_size: None,
            max_page_size: None,
            max_filter_depth: 32,
            request_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load from an optional YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_yaml(&source)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// An in-memory configuration, used by tests and the GraphQL playground.
    pub fn in_memory() -> Self {
        Self {
            database_url: MEMORY_DATABASE.to_string(),
            ..Self::default()
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            self.database_url = url;
        }
        if let Ok(schema) = std::env::var(SCHEMA_ENV) {
            self.schema_path = Some(PathBuf::from(schema));
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn load_registry(&self) -> Result<SchemaRegistry, SchemaError> {
        match &self.schema_path {
            Some(path) => SchemaRegistry::from_file(path),
            None => SchemaRegistry::enterprise_architecture(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_filter_depth, 32);
        assert!(config.default_page_size.is_none());
        assert!(!config.uses_memory_store());
        assert!(EngineConfig::in_memory().uses_memory_store());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
database_url: ":memory:"
max_page_size: 100
request_timeout_ms: 250
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert!(config.uses_memory_store());
        assert_eq!(config.max_page_size, Some(100));
        assert_eq!(config.max_filter_depth, 32);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_load_reads_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "default_page_size: 20\n").unwrap();
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.default_page_size, Some(20));
    }

    #[test]
    fn test_embedded_registry_is_default() {
        let registry = EngineConfig::default().load_registry().unwrap();
        assert!(registry.entity("Application").is_ok());
    }
}
