//! In-memory settings store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{SettingsStore, StoreError, StoreResult};
use crate::scope::ScopeId;
use crate::settings::{SettingKey, SettingsRecord};

/// Settings store kept entirely in memory.
///
/// Used for hosts that persist settings elsewhere and by tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    records: Mutex<BTreeMap<ScopeId, SettingsRecord>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> StoreResult<MutexGuard<'_, BTreeMap<ScopeId, SettingsRecord>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, scope: &ScopeId) -> StoreResult<Option<SettingsRecord>> {
        Ok(self.records()?.get(scope).cloned())
    }

    fn put(&self, scope: &ScopeId, record: SettingsRecord) -> StoreResult<()> {
        let mut records = self.records()?;
        if record.is_empty() {
            records.remove(scope);
        } else {
            records.insert(scope.clone(), record);
        }
        Ok(())
    }

    fn delete(&self, scope: &ScopeId, key: SettingKey) -> StoreResult<bool> {
        let mut records = self.records()?;
        let Some(record) = records.get_mut(scope) else {
            return Ok(false);
        };
        let removed = record.remove(key).is_some();
        if record.is_empty() {
            records.remove(scope);
        }
        Ok(removed)
    }

    fn remove_scope(&self, scope: &ScopeId) -> StoreResult<bool> {
        Ok(self.records()?.remove(scope).is_some())
    }

    fn list_scopes_with_settings(&self) -> StoreResult<Vec<ScopeId>> {
        Ok(self.records()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;

    #[test]
    fn test_empty_put_deletes_record() {
        let store = MemorySettingsStore::new();
        let mut record = SettingsRecord::new();
        record
            .set(SettingKey::FileNormal, SettingValue::Glyph("x".to_string()))
            .unwrap();
        store.put(&ScopeId::Root, record).unwrap();
        assert_eq!(store.list_scopes_with_settings().unwrap(), vec![ScopeId::Root]);

        store.put(&ScopeId::Root, SettingsRecord::new()).unwrap();
        assert!(store.list_scopes_with_settings().unwrap().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemorySettingsStore::new();
        assert!(!store.delete(&ScopeId::Root, SettingKey::FileNormal).unwrap());
    }
}
