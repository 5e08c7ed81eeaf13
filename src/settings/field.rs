//! Closed registry of known settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use linelens_scanner::Severity;

use super::SettingsError;

/// Value type a key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    /// Badge glyph (usually a single emoji)
    Glyph,
    /// Line-count threshold
    Threshold,
    /// Ordered list of glob patterns
    Patterns,
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettingKind::Glyph => "glyph",
            SettingKind::Threshold => "threshold",
            SettingKind::Patterns => "patterns",
        };
        f.write_str(s)
    }
}

/// What a badge decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTarget {
    File,
    Folder,
}

/// The two pattern lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternList {
    Exclude,
    Include,
}

impl PatternList {
    pub fn key(&self) -> SettingKey {
        match self {
            PatternList::Exclude => SettingKey::ExcludePatterns,
            PatternList::Include => SettingKey::IncludePatterns,
        }
    }
}

impl FromStr for PatternList {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclude" | "excludePatterns" => Ok(PatternList::Exclude),
            "include" | "includePatterns" => Ok(PatternList::Include),
            other => Err(SettingsError::UnknownKey(other.to_string())),
        }
    }
}

/// Every configurable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingKey {
    FileNormal,
    FileWarning,
    FileDanger,
    FolderNormal,
    FolderWarning,
    FolderDanger,
    ThresholdMid,
    ThresholdHigh,
    ExcludePatterns,
    IncludePatterns,
}

impl SettingKey {
    pub const ALL: [SettingKey; 10] = [
        SettingKey::FileNormal,
        SettingKey::FileWarning,
        SettingKey::FileDanger,
        SettingKey::FolderNormal,
        SettingKey::FolderWarning,
        SettingKey::FolderDanger,
        SettingKey::ThresholdMid,
        SettingKey::ThresholdHigh,
        SettingKey::ExcludePatterns,
        SettingKey::IncludePatterns,
    ];

    /// Dotted name used in persisted records and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::FileNormal => "badges.file.normal",
            SettingKey::FileWarning => "badges.file.warning",
            SettingKey::FileDanger => "badges.file.danger",
            SettingKey::FolderNormal => "badges.folder.normal",
            SettingKey::FolderWarning => "badges.folder.warning",
            SettingKey::FolderDanger => "badges.folder.danger",
            SettingKey::ThresholdMid => "thresholds.mid",
            SettingKey::ThresholdHigh => "thresholds.high",
            SettingKey::ExcludePatterns => "excludePatterns",
            SettingKey::IncludePatterns => "includePatterns",
        }
    }

    pub fn kind(&self) -> SettingKind {
        match self {
            SettingKey::FileNormal
            | SettingKey::FileWarning
            | SettingKey::FileDanger
            | SettingKey::FolderNormal
            | SettingKey::FolderWarning
            | SettingKey::FolderDanger => SettingKind::Glyph,
            SettingKey::ThresholdMid | SettingKey::ThresholdHigh => SettingKind::Threshold,
            SettingKey::ExcludePatterns | SettingKey::IncludePatterns => SettingKind::Patterns,
        }
    }

    /// Key of the badge glyph for a target and severity.
    pub fn badge(target: BadgeTarget, severity: Severity) -> SettingKey {
        match (target, severity) {
            (BadgeTarget::File, Severity::Normal) => SettingKey::FileNormal,
            (BadgeTarget::File, Severity::Warning) => SettingKey::FileWarning,
            (BadgeTarget::File, Severity::Danger) => SettingKey::FileDanger,
            (BadgeTarget::Folder, Severity::Normal) => SettingKey::FolderNormal,
            (BadgeTarget::Folder, Severity::Warning) => SettingKey::FolderWarning,
            (BadgeTarget::Folder, Severity::Danger) => SettingKey::FolderDanger,
        }
    }

    /// Whether a change to this key can change a severity classification.
    pub fn affects_classification(&self) -> bool {
        self.kind() == SettingKind::Threshold
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}

impl Serialize for SettingKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SettingKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A typed setting value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Glyph(String),
    Threshold(u64),
    Patterns(Vec<String>),
}

impl SettingValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Glyph(_) => SettingKind::Glyph,
            SettingValue::Threshold(_) => SettingKind::Threshold,
            SettingValue::Patterns(_) => SettingKind::Patterns,
        }
    }

    pub fn as_glyph(&self) -> Option<&str> {
        match self {
            SettingValue::Glyph(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_threshold(&self) -> Option<u64> {
        match self {
            SettingValue::Threshold(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_patterns(&self) -> Option<&[String]> {
        match self {
            SettingValue::Patterns(p) => Some(p),
            _ => None,
        }
    }

    /// Check that this value fits `key`.
    pub fn check(&self, key: SettingKey) -> Result<(), SettingsError> {
        if self.kind() != key.kind() {
            return Err(SettingsError::TypeMismatch {
                key,
                expected: key.kind(),
                found: self.kind().to_string(),
            });
        }
        if let SettingValue::Glyph(g) = self {
            if g.trim().is_empty() {
                return Err(SettingsError::InvalidValue {
                    key,
                    reason: "glyph must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Build a value for `key` from loosely typed JSON.
    ///
    /// Integral floats and numeric strings are accepted for thresholds,
    /// since hand-written config files commonly contain both.
    pub fn from_json(key: SettingKey, value: &Value) -> Result<Self, SettingsError> {
        let mismatch = || SettingsError::TypeMismatch {
            key,
            expected: key.kind(),
            found: json_type_name(value).to_string(),
        };

        let parsed = match key.kind() {
            SettingKind::Glyph => SettingValue::Glyph(value.as_str().ok_or_else(mismatch)?.to_string()),
            SettingKind::Threshold => {
                let n = match value {
                    Value::Number(n) => n
                        .as_u64()
                        .or_else(|| {
                            n.as_f64()
                                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                                .map(|f| f as u64)
                        }),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                };
                SettingValue::Threshold(n.ok_or_else(|| SettingsError::InvalidValue {
                    key,
                    reason: format!("expected a non-negative integer, got {}", value),
                })?)
            }
            SettingKind::Patterns => {
                let items = value.as_array().ok_or_else(mismatch)?;
                let mut patterns = Vec::with_capacity(items.len());
                for item in items {
                    patterns.push(item.as_str().ok_or_else(mismatch)?.to_string());
                }
                SettingValue::Patterns(patterns)
            }
        };

        parsed.check(key)?;
        Ok(parsed)
    }

    /// Parse a command-line argument for `key`.
    ///
    /// Pattern lists are comma separated; an empty string is an empty list.
    pub fn parse_for(key: SettingKey, raw: &str) -> Result<Self, SettingsError> {
        let value = match key.kind() {
            SettingKind::Glyph => SettingValue::Glyph(raw.trim().to_string()),
            SettingKind::Threshold => {
                SettingValue::Threshold(raw.trim().parse().map_err(|_| SettingsError::InvalidValue {
                    key,
                    reason: format!("expected a non-negative integer, got {:?}", raw),
                })?)
            }
            SettingKind::Patterns => SettingValue::Patterns(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        };
        value.check(key)?;
        Ok(value)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Glyph(g) => f.write_str(g),
            SettingValue::Threshold(t) => write!(f, "{}", t),
            SettingValue::Patterns(p) => write!(f, "[{}]", p.join(", ")),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
