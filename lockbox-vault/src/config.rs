//! Storage engine configuration.

use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the namespaced store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Scope identifier used for every record in the ephemeral class.
    pub ephemeral_scope: String,

    /// Key of the storage-class lock record in the ephemeral backend.
    pub marker_key: String,

    /// Logical keys stored as plaintext (non-sensitive labels).
    pub plaintext_keys: Vec<String>,

    /// DuckDB file for the durable backend. `None` keeps it in memory.
    pub durable_path: Option<PathBuf>,

    /// DuckDB memory cap for the durable backend.
    pub duckdb_memory_limit: String,

    /// DuckDB worker threads for the durable backend.
    pub duckdb_threads: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            ephemeral_scope: "session".to_string(),
            marker_key: "__lockbox:storage_class".to_string(),
            plaintext_keys: ["displayName", "label", "theme", "locale"]
                .into_iter()
                .map(String::from)
                .collect(),
            durable_path: None,
            duckdb_memory_limit: "64MB".to_string(),
            duckdb_threads: 1,
        }
    }
}

impl VaultConfig {
    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> VaultResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether `logical_key` is exempt from encryption.
    pub fn is_plaintext_key(&self, logical_key: &str) -> bool {
        self.plaintext_keys.iter().any(|k| k == logical_key)
    }

    fn validate(&self) -> VaultResult<()> {
        if self.ephemeral_scope.is_empty() || self.ephemeral_scope.contains(':') {
            return Err(VaultError::Config(format!(
                "ephemeral_scope must be non-empty and contain no ':' (got {:?})",
                self.ephemeral_scope
            )));
        }
        if self.marker_key.is_empty() {
            return Err(VaultError::Config("marker_key must be non-empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.ephemeral_scope, "session");
        assert_eq!(config.duckdb_threads, 1);
        assert!(config.durable_path.is_none());
        assert!(config.is_plaintext_key("displayName"));
        assert!(!config.is_plaintext_key("apiKey"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = VaultConfig::from_json(r#"{"plaintext_keys": ["label"]}"#).unwrap();
        assert_eq!(config.plaintext_keys, vec!["label"]);
        assert_eq!(config.ephemeral_scope, "session");
    }

    #[test]
    fn rejects_scope_with_separator() {
        let err = VaultConfig::from_json(r#"{"ephemeral_scope": "a:b"}"#).unwrap_err();
        assert!(matches!(err, VaultError::Config(_)));
    }

    #[test]
    fn serialization_roundtrip() {
        let config = VaultConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(VaultConfig::from_json(&json).unwrap(), config);
    }
}
