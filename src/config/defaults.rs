//! Built-in engine defaults (layer 1)

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Directory under the workspace root holding the workspace store
pub const DEFAULT_STORE_DIR: &str = ".linelens";

/// File name of the user-level Global store
pub const GLOBAL_FILE: &str = "global.json";

/// Engine config file looked up under the store directory
pub const ENGINE_FILE: &str = "engine.toml";

/// Legacy per-directory settings file
pub const LEGACY_FILE_NAME: &str = ".linelens.json";

/// Where settings documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store directory relative to the workspace root (default: ".linelens")
    pub dir: PathBuf,

    /// Global store file; unset means the per-user default location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_file: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORE_DIR),
            global_file: None,
        }
    }
}

/// Cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Resolved workspaces kept by the service cache (default: 8)
    pub max_workspaces: usize,

    /// Files kept by the derived value cache (default: 512)
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_workspaces: 8,
            max_entries: 512,
        }
    }
}

/// Retry behavior for store I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoSettings {
    /// Attempts per read or write, including the first (default: 3)
    pub retry_attempts: u32,

    /// Backoff before the second attempt in milliseconds (default: 25)
    pub retry_backoff_ms: u64,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_backoff_ms: 25,
        }
    }
}

/// Legacy format migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// File name searched for in every directory (default: ".linelens.json")
    pub legacy_file_name: String,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            legacy_file_name: LEGACY_FILE_NAME.to_string(),
        }
    }
}

/// Per-user location of the Global store.
///
/// `$XDG_CONFIG_HOME/linelens/global.json`, then
/// `$HOME/.config/linelens/global.json`; without either the Global store
/// falls back to the workspace's own store directory.
pub fn default_global_file(root: &Path) -> PathBuf {
    let non_empty = |name: &str| env::var_os(name).filter(|v| !v.is_empty());

    if let Some(xdg) = non_empty("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("linelens").join(GLOBAL_FILE);
    }
    if let Some(home) = non_empty("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("linelens")
            .join(GLOBAL_FILE);
    }
    root.join(DEFAULT_STORE_DIR).join(GLOBAL_FILE)
}
