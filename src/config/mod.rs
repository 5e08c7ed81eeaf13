//! Engine configuration
//!
//! Operational settings of the engine itself (where stores live, cache
//! bounds, I/O retry, migration), as opposed to the scoped badge settings
//! it resolves. Merged from three layers:
//! 1. Built-in defaults
//! 2. Config file (TOML)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{
    default_global_file, CacheSettings, IoSettings, MigrationSettings, StoreSettings,
    DEFAULT_STORE_DIR, ENGINE_FILE, GLOBAL_FILE, LEGACY_FILE_NAME,
};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, EngineConfig};
pub use merge::{deep_merge, expand_dotted, merge_layers};
