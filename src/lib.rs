//! linelens - scoped settings for line-count badges
//!
//! Settings are defined at nested scopes (Global, workspace Root, any
//! Directory) and resolved by walking to the nearest scope that defines
//! them, with provenance. Per-file line counts derived from those settings
//! are cached and invalidated precisely when files or settings change.

pub mod config;
pub mod migrate;
pub mod patterns;
pub mod resolve;
pub mod scope;
pub mod service;
pub mod session;
pub mod settings;
pub mod store;

pub use config::{ConfigError, EffectiveConfig, EngineConfig};
pub use migrate::{MigrationAdapter, MigrationErrorKind, MigrationFailure, MigrationReport};
pub use patterns::{PatternAccumulator, PatternEntry, PatternMatcher};
pub use resolve::{ResolutionEngine, Resolved, ResolvedSettings};
pub use scope::{PathSecurityError, RelativePath, ScopeId, ScopeLevel, ScopeTree, Source};
pub use service::{ChangeEvent, ChangeListener, ServiceCache, ServiceError, SettingsService};
pub use session::{Decoration, FolderStats, HostEvent, Session};
pub use settings::{PatternList, SettingKey, SettingValue, SettingsError, SettingsRecord};
pub use store::{SettingsStore, StoreError, StoreFactory};

pub use linelens_cache::{CacheConfig, CachedStats, DerivedValueCache};
pub use linelens_scanner::{BasicScanner, FileStats, LineScanner, Severity, Thresholds};
