//! Built-in defaults
//!
//! The single table consulted when no scope in the chain defines a key.
//! Nothing outside the resolution engine's final tier reads it.

use serde::{Deserialize, Serialize};

use super::{SettingKey, SettingValue};

/// Built-in default values for every known key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// File badge glyphs, normal/warning/danger
    pub file_badges: [String; 3],

    /// Folder badge glyphs, normal/warning/danger
    pub folder_badges: [String; 3],

    /// Line count at which a file turns "warning" (default: 300)
    pub threshold_mid: u64,

    /// Line count at which a file turns "danger" (default: 1000)
    pub threshold_high: u64,

    /// Excluded from counting (default: dependency and build output dirs)
    pub exclude_patterns: Vec<String>,

    /// Counted files (default: everything)
    pub include_patterns: Vec<String>,
}

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/.linelens/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/*.min.js",
    "**/*.lock",
];

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            file_badges: ["🟢".to_string(), "🟡".to_string(), "🔴".to_string()],
            folder_badges: ["🟩".to_string(), "🟨".to_string(), "🟥".to_string()],
            threshold_mid: 300,
            threshold_high: 1000,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            include_patterns: vec!["**/*".to_string()],
        }
    }
}

impl BuiltinDefaults {
    /// Default value of `key`.
    pub fn value_for(&self, key: SettingKey) -> SettingValue {
        match key {
            SettingKey::FileNormal => SettingValue::Glyph(self.file_badges[0].clone()),
            SettingKey::FileWarning => SettingValue::Glyph(self.file_badges[1].clone()),
            SettingKey::FileDanger => SettingValue::Glyph(self.file_badges[2].clone()),
            SettingKey::FolderNormal => SettingValue::Glyph(self.folder_badges[0].clone()),
            SettingKey::FolderWarning => SettingValue::Glyph(self.folder_badges[1].clone()),
            SettingKey::FolderDanger => SettingValue::Glyph(self.folder_badges[2].clone()),
            SettingKey::ThresholdMid => SettingValue::Threshold(self.threshold_mid),
            SettingKey::ThresholdHigh => SettingValue::Threshold(self.threshold_high),
            SettingKey::ExcludePatterns => SettingValue::Patterns(self.exclude_patterns.clone()),
            SettingKey::IncludePatterns => SettingValue::Patterns(self.include_patterns.clone()),
        }
    }
}
