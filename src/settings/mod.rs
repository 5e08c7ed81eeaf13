//! Settings data model
//!
//! A closed set of keys ([`SettingKey`]) with statically known value kinds,
//! sparse per-scope records, and one table of built-in defaults.

mod defaults;
mod field;
mod record;

pub use defaults::BuiltinDefaults;
pub use field::{BadgeTarget, PatternList, SettingKey, SettingKind, SettingValue};
pub use record::SettingsRecord;

/// Errors for settings values and keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown setting key: {0}")]
    UnknownKey(String),

    #[error("{key} expects a {expected} value, got {found}")]
    TypeMismatch {
        key: SettingKey,
        expected: SettingKind,
        found: String,
    },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: SettingKey, reason: String },

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
