//! Legacy per-directory settings format.
//!
//! A legacy file is a JSON object whose keys may be nested or dotted
//! (`{"thresholds": {"mid": 1}}` and `{"thresholds.mid": 1}` are the same).
//! Several spellings map to each schema key; where two spellings of one key
//! appear in the same file, the later row of [`KEY_MAP`] wins.

use serde_json::Value;

use crate::config::expand_dotted;
use crate::settings::{SettingKey, SettingValue, SettingsError, SettingsRecord};

/// Legacy JSON pointer → schema key. Older aliases first.
const KEY_MAP: &[(&str, SettingKey)] = &[
    ("/emoji/small", SettingKey::FileNormal),
    ("/emoji/normal", SettingKey::FileNormal),
    ("/emoji/medium", SettingKey::FileWarning),
    ("/emoji/warning", SettingKey::FileWarning),
    ("/emoji/large", SettingKey::FileDanger),
    ("/emoji/danger", SettingKey::FileDanger),
    ("/folderEmoji/normal", SettingKey::FolderNormal),
    ("/folderEmoji/warning", SettingKey::FolderWarning),
    ("/folderEmoji/danger", SettingKey::FolderDanger),
    ("/thresholds/warning", SettingKey::ThresholdMid),
    ("/thresholds/mid", SettingKey::ThresholdMid),
    ("/thresholds/danger", SettingKey::ThresholdHigh),
    ("/thresholds/high", SettingKey::ThresholdHigh),
    ("/exclude", SettingKey::ExcludePatterns),
    ("/excludePatterns", SettingKey::ExcludePatterns),
    ("/include", SettingKey::IncludePatterns),
    ("/includePatterns", SettingKey::IncludePatterns),
];

/// Why a legacy document could not be converted.
#[derive(Debug, thiserror::Error)]
pub enum LegacyError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("top-level value must be an object")]
    NotAnObject,

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// A converted legacy document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacySettings {
    pub record: SettingsRecord,
    /// Dotted paths of keys with no schema counterpart
    pub ignored: Vec<String>,
}

/// Convert the bytes of a legacy settings file.
pub fn parse_legacy(bytes: &[u8]) -> Result<LegacySettings, LegacyError> {
    let raw: Value = serde_json::from_slice(bytes)?;
    if !raw.is_object() {
        return Err(LegacyError::NotAnObject);
    }
    let document = expand_dotted(raw);

    let mut record = SettingsRecord::new();
    for (pointer, key) in KEY_MAP {
        if let Some(value) = document.pointer(pointer) {
            record.set(*key, SettingValue::from_json(*key, value)?)?;
        }
    }

    let mut ignored = Vec::new();
    collect_unknown(&document, String::new(), &mut ignored);
    Ok(LegacySettings { record, ignored })
}

/// Leaf pointers that no row of [`KEY_MAP`] consumes, as dotted paths.
fn collect_unknown(value: &Value, pointer: String, ignored: &mut Vec<String>) {
    if KEY_MAP.iter().any(|(known, _)| *known == pointer) {
        return;
    }
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_unknown(child, format!("{}/{}", pointer, key), ignored);
            }
        }
        _ if pointer.is_empty() => {}
        _ => ignored.push(pointer.trim_start_matches('/').replace('/', ".")),
    }
}
