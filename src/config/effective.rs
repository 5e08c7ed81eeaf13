//! Effective engine configuration with provenance
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. Config file (`--config`, or `<root>/.linelens/engine.toml` when present)
//! 3. Command-line overrides

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use linelens_cache::CacheConfig;

use super::defaults::{
    default_global_file, CacheSettings, IoSettings, MigrationSettings, StoreSettings,
    DEFAULT_STORE_DIR, ENGINE_FILE,
};
use super::merge::{expand_dotted, merge_layers};
use crate::store::RetryPolicy;

/// Upper bound for `cache.max_entries`
const MAX_CACHE_ENTRIES: usize = 100_000;

/// Upper bound for `io.retry_attempts`
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default tracing filter when `RUST_LOG` is unset (default: "info")
    pub log_level: String,
    pub store: StoreSettings,
    pub cache: CacheSettings,
    pub io: IoSettings,
    pub migration: MigrationSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store: StoreSettings::default(),
            cache: CacheSettings::default(),
            io: IoSettings::default(),
            migration: MigrationSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_entries == 0 || self.cache.max_entries > MAX_CACHE_ENTRIES {
            return Err(ConfigError::ValidationError(format!(
                "cache.max_entries must be in (0, {}]",
                MAX_CACHE_ENTRIES
            )));
        }
        if self.cache.max_workspaces == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_workspaces must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_RETRY_ATTEMPTS).contains(&self.io.retry_attempts) {
            return Err(ConfigError::ValidationError(format!(
                "io.retry_attempts must be in [1, {}]",
                MAX_RETRY_ATTEMPTS
            )));
        }

        let legacy = &self.migration.legacy_file_name;
        if legacy.trim().is_empty() || legacy.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "migration.legacy_file_name must be a plain file name, got {:?}",
                legacy
            )));
        }

        let dir = &self.store.dir;
        if dir.as_os_str().is_empty()
            || dir
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ConfigError::ValidationError(format!(
                "store.dir must be a relative path inside the workspace, got {}",
                dir.display()
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.io.retry_attempts,
            backoff: Duration::from_millis(self.io.retry_backoff_ms),
        }
    }

    pub fn derived_cache(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.cache.max_entries,
        }
    }

    /// Global store file for a workspace rooted at `root`.
    pub fn global_file(&self, root: &Path) -> PathBuf {
        self.store
            .global_file
            .clone()
            .unwrap_or_else(|| default_global_file(root))
    }
}

/// Where a configuration layer came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// One contributing layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// The merged configuration plus the layers that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config: EngineConfig,
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Merge built-in defaults, a config file and CLI overrides.
    ///
    /// An explicit `config_path` must exist. Without one,
    /// `<root>/.linelens/engine.toml` is used when present.
    pub fn build(
        root: &Path,
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let builtin = serde_json::to_value(EngineConfig::default())
            .map_err(|e| ConfigError::ParseError(format!("builtin defaults: {}", e)))?;
        let mut layers = vec![builtin];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        let file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let implicit = root.join(DEFAULT_STORE_DIR).join(ENGINE_FILE);
                implicit.is_file().then_some(implicit)
            }
        };
        if let Some(path) = file {
            let (value, digest) = load_toml_file(&path)?;
            tracing::debug!(path = %path.display(), "loaded engine config");
            layers.push(expand_dotted(value));
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(expand_dotted(cli));
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let config: EngineConfig = serde_json::from_value(merge_layers(layers))
            .map_err(|e| ConfigError::ParseError(format!("invalid engine config: {}", e)))?;
        config.validate()?;

        Ok(Self { config, sources })
    }
}

/// Read and parse a TOML file, returning it as JSON plus its digest.
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let table: toml::Value = toml::from_str(&contents)
        .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(table), digest))
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
