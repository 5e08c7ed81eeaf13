//! Settings persistence
//!
//! The [`SettingsStore`] contract: get, put and delete
//! a scope's record, and list which scopes have one. How records are stored
//! is up to the implementation.
//!
//! The Global scope is shared by every workspace, so it lives in its own
//! store; [`StoreSet`] routes each scope to the right one.

mod file;
mod memory;
mod retry;

pub use file::{FileSettingsStore, SCHEMA_ID, SCHEMA_VERSION};
pub use memory::MemorySettingsStore;
pub use retry::RetryPolicy;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::scope::ScopeId;
use crate::settings::{SettingKey, SettingsRecord};

/// Store result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence errors. Any of these aborts the mutation that hit it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt settings document {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported settings schema version {found} in {}", .path.display())]
    UnsupportedSchema { path: PathBuf, found: u32 },

    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Persistent map from scope to that scope's explicitly set fields.
pub trait SettingsStore: Send + Sync + fmt::Debug {
    /// Record of `scope`, if it has one.
    fn get(&self, scope: &ScopeId) -> StoreResult<Option<SettingsRecord>>;

    /// Replace the record of `scope`. An empty record deletes it.
    fn put(&self, scope: &ScopeId, record: SettingsRecord) -> StoreResult<()>;

    /// Remove one field. Returns whether it was present; removing the last
    /// field removes the record.
    fn delete(&self, scope: &ScopeId, key: SettingKey) -> StoreResult<bool>;

    /// Remove a scope's whole record. Returns whether it existed.
    fn remove_scope(&self, scope: &ScopeId) -> StoreResult<bool>;

    /// Every scope that currently has a record.
    fn list_scopes_with_settings(&self) -> StoreResult<Vec<ScopeId>>;
}

/// The stores backing one workspace: the shared Global store and the
/// workspace's own store for Root and Directory scopes.
#[derive(Debug, Clone)]
pub struct StoreSet {
    global: Arc<dyn SettingsStore>,
    workspace: Arc<dyn SettingsStore>,
}

impl StoreSet {
    pub fn new(global: Arc<dyn SettingsStore>, workspace: Arc<dyn SettingsStore>) -> Self {
        Self { global, workspace }
    }

    /// Store that owns `scope`.
    pub fn for_scope(&self, scope: &ScopeId) -> &dyn SettingsStore {
        if scope.is_global() {
            self.global.as_ref()
        } else {
            self.workspace.as_ref()
        }
    }

    /// Load every record visible to this workspace.
    pub fn load_all(&self) -> StoreResult<BTreeMap<ScopeId, SettingsRecord>> {
        let mut records = BTreeMap::new();
        if let Some(global) = self.global.get(&ScopeId::Global)? {
            records.insert(ScopeId::Global, global);
        }
        for scope in self.workspace.list_scopes_with_settings()? {
            // A workspace document never owns the Global scope
            if scope.is_global() {
                continue;
            }
            if let Some(record) = self.workspace.get(&scope)? {
                records.insert(scope, record);
            }
        }
        Ok(records)
    }
}

/// Opens the stores for a workspace root.
pub trait StoreFactory: Send + Sync {
    fn open(&self, root: &Path) -> StoreResult<StoreSet>;
}

/// Factory for JSON file stores.
///
/// Workspace records live in `<root>/<store_dir>/settings.json`; the Global
/// record lives in a single user-level file shared by all workspaces.
#[derive(Debug)]
pub struct FileStoreFactory {
    store_dir: PathBuf,
    global: Arc<FileSettingsStore>,
    retry: RetryPolicy,
}

impl FileStoreFactory {
    /// Workspace document file name
    pub const WORKSPACE_FILE: &'static str = "settings.json";

    pub fn new(store_dir: impl Into<PathBuf>, global_file: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            store_dir: store_dir.into(),
            global: Arc::new(FileSettingsStore::new(global_file, retry)),
            retry,
        }
    }

    /// Path of the workspace document for `root`.
    pub fn workspace_file(&self, root: &Path) -> PathBuf {
        root.join(&self.store_dir).join(Self::WORKSPACE_FILE)
    }
}

impl StoreFactory for FileStoreFactory {
    fn open(&self, root: &Path) -> StoreResult<StoreSet> {
        let workspace = FileSettingsStore::new(self.workspace_file(root), self.retry);
        Ok(StoreSet::new(self.global.clone(), Arc::new(workspace)))
    }
}

/// Factory handing out in-memory stores that outlive cache invalidation.
#[derive(Debug, Default)]
pub struct MemoryStoreFactory {
    global: Arc<MemorySettingsStore>,
    workspaces: Mutex<HashMap<PathBuf, Arc<MemorySettingsStore>>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open(&self, root: &Path) -> StoreResult<StoreSet> {
        let mut workspaces = self
            .workspaces
            .lock()
            .map_err(|_| StoreError::Unavailable("memory factory lock poisoned".to_string()))?;
        let workspace = workspaces
            .entry(root.to_path_buf())
            .or_insert_with(|| Arc::new(MemorySettingsStore::new()))
            .clone();
        Ok(StoreSet::new(self.global.clone(), workspace))
    }
}
