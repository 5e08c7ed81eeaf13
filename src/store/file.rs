//! JSON file backed settings store
//!
//! One document holds every scope's record for a store. Writes go to a
//! temporary sibling file which is then renamed over the document, so a
//! crash mid-write leaves the previous document intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::retry::RetryPolicy;
use super::{SettingsStore, StoreError, StoreResult};
use crate::scope::ScopeId;
use crate::settings::{SettingKey, SettingsRecord};

/// Schema version for settings documents
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "linelens/settings@1";

/// Persisted settings document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    schema_version: u32,
    schema_id: String,
    #[serde(default)]
    scopes: BTreeMap<ScopeId, SettingsRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            scopes: BTreeMap::new(),
        }
    }
}

/// Settings store persisted as a single JSON document.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    retry: RetryPolicy,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            retry,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> StoreResult<StoreDocument> {
        let bytes = match self.retry.run("read settings", || fs::read(&self.path)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(e) => return Err(self.io_error(e)),
        };

        let document: StoreDocument =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        if document.schema_version != SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                path: self.path.clone(),
                found: document.schema_version,
            });
        }
        Ok(document)
    }

    fn save(&self, document: &StoreDocument) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(document).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        self.retry
            .run("write settings", || {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = fs::File::create(&tmp_path)?;
                file.write_all(&json)?;
                file.sync_all()?;
                fs::rename(&tmp_path, &self.path)
            })
            .map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), scopes = document.scopes.len(), "settings written");
        Ok(())
    }

    fn modify<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut StoreDocument) -> (T, bool),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("settings write lock poisoned".to_string()))?;
        let mut document = self.load()?;
        let (result, dirty) = f(&mut document);
        if dirty {
            self.save(&document)?;
        }
        Ok(result)
    }
}

impl SettingsStore for FileSettingsStore {
    fn get(&self, scope: &ScopeId) -> StoreResult<Option<SettingsRecord>> {
        Ok(self.load()?.scopes.remove(scope))
    }

    fn put(&self, scope: &ScopeId, record: SettingsRecord) -> StoreResult<()> {
        self.modify(|doc| {
            if record.is_empty() {
                let existed = doc.scopes.remove(scope).is_some();
                ((), existed)
            } else {
                doc.scopes.insert(scope.clone(), record);
                ((), true)
            }
        })
    }

    fn delete(&self, scope: &ScopeId, key: SettingKey) -> StoreResult<bool> {
        self.modify(|doc| {
            let Some(record) = doc.scopes.get_mut(scope) else {
                return (false, false);
            };
            if record.remove(key).is_none() {
                return (false, false);
            }
            if record.is_empty() {
                doc.scopes.remove(scope);
            } else {
                record.touch();
            }
            (true, true)
        })
    }

    fn remove_scope(&self, scope: &ScopeId) -> StoreResult<bool> {
        self.modify(|doc| {
            let existed = doc.scopes.remove(scope).is_some();
            (existed, existed)
        })
    }

    fn list_scopes_with_settings(&self) -> StoreResult<Vec<ScopeId>> {
        Ok(self.load()?.scopes.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;
    use tempfile::TempDir;

    fn record(key: SettingKey, value: SettingValue) -> SettingsRecord {
        let mut r = SettingsRecord::new();
        r.set(key, value).unwrap();
        r
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileSettingsStore::new(temp.path().join("settings.json"), RetryPolicy::none());
        assert_eq!(store.get(&ScopeId::Root).unwrap(), None);
        assert!(store.list_scopes_with_settings().unwrap().is_empty());
    }

    #[test]
    fn test_put_get_persists_across_instances() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("settings.json");
        let r = record(SettingKey::ThresholdMid, SettingValue::Threshold(42));

        FileSettingsStore::new(&path, RetryPolicy::none())
            .put(&ScopeId::Root, r.clone())
            .unwrap();

        let reopened = FileSettingsStore::new(&path, RetryPolicy::none());
        assert_eq!(reopened.get(&ScopeId::Root).unwrap(), Some(r));
        assert_eq!(
            reopened.list_scopes_with_settings().unwrap(),
            vec![ScopeId::Root]
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_delete_last_key_removes_record() {
        let temp = TempDir::new().unwrap();
        let store = FileSettingsStore::new(temp.path().join("s.json"), RetryPolicy::none());
        store
            .put(
                &ScopeId::Root,
                record(SettingKey::ThresholdMid, SettingValue::Threshold(1)),
            )
            .unwrap();

        assert!(store.delete(&ScopeId::Root, SettingKey::ThresholdMid).unwrap());
        assert!(!store.delete(&ScopeId::Root, SettingKey::ThresholdMid).unwrap());
        assert_eq!(store.get(&ScopeId::Root).unwrap(), None);
    }

    #[test]
    fn test_corrupt_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.json");
        fs::write(&path, "{ not json").unwrap();
        let store = FileSettingsStore::new(&path, RetryPolicy::none());
        assert!(matches!(
            store.get(&ScopeId::Root),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_unsupported_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("s.json");
        fs::write(
            &path,
            r#"{"schema_version": 99, "schema_id": "linelens/settings@99", "scopes": {}}"#,
        )
        .unwrap();
        let store = FileSettingsStore::new(&path, RetryPolicy::none());
        assert!(matches!(
            store.get(&ScopeId::Root),
            Err(StoreError::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn test_write_failure_surfaces_error() {
        let temp = TempDir::new().unwrap();
        // A directory where the document should be makes the rename fail
        let path = temp.path().join("s.json");
        fs::create_dir_all(path.join("blocker")).unwrap();
        let store = FileSettingsStore::new(&path, RetryPolicy::none());
        let result = store.put(
            &ScopeId::Root,
            record(SettingKey::ThresholdMid, SettingValue::Threshold(1)),
        );
        assert!(result.is_err());
    }
}
