//! Per-scope settings record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{SettingKey, SettingValue, SettingsError};

/// Fields explicitly set at one scope.
///
/// A record never holds inherited values: a key is present only because
/// somebody wrote it at this scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord", into = "RawRecord")]
pub struct SettingsRecord {
    values: BTreeMap<SettingKey, SettingValue>,
    updated_at: Option<DateTime<Utc>>,
}

impl SettingsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SettingKey) -> Option<&SettingValue> {
        self.values.get(&key)
    }

    pub fn contains(&self, key: SettingKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Set a field, returning the previous local value.
    pub fn set(
        &mut self,
        key: SettingKey,
        value: SettingValue,
    ) -> Result<Option<SettingValue>, SettingsError> {
        value.check(key)?;
        Ok(self.values.insert(key, value))
    }

    /// Remove a field, returning the local value it had.
    pub fn remove(&mut self, key: SettingKey) -> Option<SettingValue> {
        self.values.remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = SettingKey> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingKey, &SettingValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Overlay `other` onto this record; keys in `other` win.
    pub fn merge_from(&mut self, other: &SettingsRecord) {
        for (key, value) in other.iter() {
            self.values.insert(key, value.clone());
        }
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Stamp the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// On-disk shape: dotted keys to plain JSON values.
#[derive(Debug, Serialize, Deserialize)]
struct RawRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    values: BTreeMap<String, Value>,
}

impl TryFrom<RawRecord> for SettingsRecord {
    type Error = SettingsError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let mut values = BTreeMap::new();
        for (name, json) in raw.values {
            let key: SettingKey = name.parse()?;
            values.insert(key, SettingValue::from_json(key, &json)?);
        }
        Ok(Self {
            values,
            updated_at: raw.updated_at,
        })
    }
}

impl From<SettingsRecord> for RawRecord {
    fn from(record: SettingsRecord) -> Self {
        let values = record
            .values
            .into_iter()
            .map(|(key, value)| {
                let json = match value {
                    SettingValue::Glyph(g) => Value::String(g),
                    SettingValue::Threshold(t) => Value::from(t),
                    SettingValue::Patterns(p) => {
                        Value::Array(p.into_iter().map(Value::String).collect())
                    }
                };
                (key.as_str().to_string(), json)
            })
            .collect();
        RawRecord {
            updated_at: record.updated_at,
            values,
        }
    }
}
