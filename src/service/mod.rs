//! Settings service
//!
//! The single entry point for reading and changing scoped settings. Every
//! mutation runs the same sequence:
//! 1. persist the change through the owning store
//! 2. invalidate the cached workspace (every workspace for the Global scope)
//! 3. notify change listeners
//!
//! If step 1 fails the error is returned and steps 2 and 3 do not run, so
//! readers keep seeing the last persisted state.
//!
//! Mutations take `&mut self`; a host that shares the service between
//! threads wraps it in a `RwLock`.

mod cache;

pub use cache::{ServiceCache, Workspace};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigError, EngineConfig};
use crate::migrate::{MigrationAdapter, MigrationReport};
use crate::patterns::{MatcherError, PatternAccumulator, PatternEdit, PatternEntry, PatternMatcher};
use crate::resolve::{Resolved, ResolvedSettings};
use crate::scope::{PathSecurityError, ScopeId};
use crate::settings::{BuiltinDefaults, PatternList, SettingKey, SettingValue, SettingsError};
use crate::store::{FileStoreFactory, StoreError, StoreFactory};

use linelens_cache::CacheError;

/// Errors surfaced by the service and the host session
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("persistence error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Path(#[from] PathSecurityError),

    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Service result type
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A settings change that has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    /// Affected workspace; `None` when every workspace is affected
    pub root: Option<PathBuf>,
    /// Changed scope; `None` when several scopes may have changed
    pub scope: Option<ScopeId>,
    pub keys: Vec<SettingKey>,
}

impl ChangeEvent {
    /// Whether the change can be visible from the workspace at `root`.
    pub fn concerns(&self, root: &Path) -> bool {
        self.root.as_deref().map_or(true, |r| r == root)
    }

    /// Whether a changed key can change a severity classification.
    pub fn affects_classification(&self) -> bool {
        self.keys.iter().any(|k| k.affects_classification())
    }
}

/// Receives [`ChangeEvent`]s after the caches have been invalidated.
pub trait ChangeListener: Send + Sync {
    fn on_settings_changed(&self, event: &ChangeEvent);
}

/// Mutation facade over the stores and the workspace cache.
pub struct SettingsService {
    cache: ServiceCache,
    listeners: Vec<Arc<dyn ChangeListener>>,
    legacy_file_name: String,
}

impl fmt::Debug for SettingsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsService")
            .field("cache", &self.cache)
            .field("listeners", &self.listeners.len())
            .field("legacy_file_name", &self.legacy_file_name)
            .finish()
    }
}

impl SettingsService {
    pub fn new(factory: Arc<dyn StoreFactory>, config: &EngineConfig) -> Self {
        Self {
            cache: ServiceCache::new(factory, BuiltinDefaults::default(), config.cache.max_workspaces),
            listeners: Vec::new(),
            legacy_file_name: config.migration.legacy_file_name.clone(),
        }
    }

    /// Service over JSON file stores laid out as `config` describes.
    pub fn with_file_stores(root: &Path, config: &EngineConfig) -> Self {
        let factory = FileStoreFactory::new(
            config.store.dir.clone(),
            config.global_file(root),
            config.retry_policy(),
        );
        Self::new(Arc::new(factory), config)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    /// Loaded workspace for `root`.
    pub fn workspace(&self, root: &Path) -> ServiceResult<Arc<Workspace>> {
        Ok(self.cache.get(root)?)
    }

    /// Every key resolved at `scope`.
    pub fn resolve(&self, root: &Path, scope: &ScopeId) -> ServiceResult<ResolvedSettings> {
        Ok(self.workspace(root)?.engine().resolve(scope))
    }

    pub fn resolve_field(&self, root: &Path, scope: &ScopeId, key: SettingKey) -> ServiceResult<Resolved> {
        Ok(self.workspace(root)?.engine().resolve_field(scope, key))
    }

    pub fn patterns_with_source(
        &self,
        root: &Path,
        scope: &ScopeId,
        list: PatternList,
    ) -> ServiceResult<Vec<PatternEntry>> {
        let workspace = self.workspace(root)?;
        Ok(PatternAccumulator::new(workspace.engine()).patterns_with_source(scope, list))
    }

    /// Include/exclude matcher for the lists effective at `scope`.
    pub fn matcher(&self, root: &Path, scope: &ScopeId) -> ServiceResult<PatternMatcher> {
        let workspace = self.workspace(root)?;
        let (include, _) = workspace.engine().patterns(scope, PatternList::Include);
        let (exclude, _) = workspace.engine().patterns(scope, PatternList::Exclude);
        Ok(PatternMatcher::from_resolved(&include, &exclude)?)
    }

    /// Set `key` at `scope`.
    pub fn set_field(
        &mut self,
        root: &Path,
        scope: &ScopeId,
        key: SettingKey,
        value: SettingValue,
    ) -> ServiceResult<()> {
        value.check(key)?;
        let workspace = self.workspace(root)?;
        let store = workspace.stores().for_scope(scope);

        let mut record = store.get(scope)?.unwrap_or_default();
        record.set(key, value)?;
        record.touch();
        store.put(scope, record)?;

        tracing::info!(%scope, %key, "setting updated");
        self.commit(root, scope, vec![key]);
        Ok(())
    }

    /// Remove `key` from `scope`'s own record so it inherits again.
    ///
    /// Returns `false`, without invalidating or notifying, when the scope
    /// did not define the key.
    pub fn reset_field(&mut self, root: &Path, scope: &ScopeId, key: SettingKey) -> ServiceResult<bool> {
        let workspace = self.workspace(root)?;
        if !workspace.stores().for_scope(scope).delete(scope, key)? {
            tracing::debug!(%scope, %key, "reset of undefined setting");
            return Ok(false);
        }

        tracing::info!(%scope, %key, "setting reset");
        self.commit(root, scope, vec![key]);
        Ok(true)
    }

    /// Remove every setting of `scope`.
    pub fn reset_scope(&mut self, root: &Path, scope: &ScopeId) -> ServiceResult<bool> {
        let workspace = self.workspace(root)?;
        let keys: Vec<SettingKey> = match workspace.engine().record(scope) {
            Some(record) => record.keys().collect(),
            None => SettingKey::ALL.to_vec(),
        };
        if !workspace.stores().for_scope(scope).remove_scope(scope)? {
            return Ok(false);
        }

        tracing::info!(%scope, "scope settings cleared");
        self.commit(root, scope, keys);
        Ok(true)
    }

    /// Add a pattern to a list at `scope`, copying the inherited list first
    /// if the scope has none of its own.
    pub fn add_pattern(
        &mut self,
        root: &Path,
        scope: &ScopeId,
        list: PatternList,
        pattern: &str,
    ) -> ServiceResult<PatternEdit> {
        let workspace = self.workspace(root)?;
        let edit = PatternAccumulator::new(workspace.engine()).plan_add(scope, list, pattern)?;
        self.apply_edit(root, scope, &edit)?;
        Ok(edit)
    }

    /// Remove a pattern from a list at `scope`. An emptied list stays as an
    /// explicit empty override.
    pub fn remove_pattern(
        &mut self,
        root: &Path,
        scope: &ScopeId,
        list: PatternList,
        pattern: &str,
    ) -> ServiceResult<PatternEdit> {
        let workspace = self.workspace(root)?;
        let edit = PatternAccumulator::new(workspace.engine()).plan_remove(scope, list, pattern)?;
        self.apply_edit(root, scope, &edit)?;
        Ok(edit)
    }

    /// Tell the service its stores changed behind its back, e.g. a settings
    /// document edited by hand. `None` means every workspace.
    pub fn notify_changed(&mut self, root: Option<&Path>) {
        match root {
            Some(root) => {
                self.cache.invalidate(root);
            }
            None => self.cache.invalidate_all(),
        }
        self.emit(ChangeEvent {
            root: root.map(Path::to_path_buf),
            scope: None,
            keys: SettingKey::ALL.to_vec(),
        });
    }

    /// Fold legacy per-directory files under `root` into the workspace store.
    ///
    /// Listeners are notified once for the whole batch, and only when at
    /// least one record was written.
    pub fn migrate_and_cleanup(&mut self, root: &Path) -> ServiceResult<MigrationReport> {
        let workspace = self.workspace(root)?;
        let report = MigrationAdapter::new(
            workspace.tree(),
            workspace.stores().for_scope(&ScopeId::Root),
            &self.legacy_file_name,
        )
        .migrate_and_cleanup();

        if report.wrote_records() {
            self.cache.invalidate(root);
            self.emit(ChangeEvent {
                root: Some(root.to_path_buf()),
                scope: None,
                keys: report.keys(),
            });
        }
        Ok(report)
    }

    fn apply_edit(&mut self, root: &Path, scope: &ScopeId, edit: &PatternEdit) -> ServiceResult<()> {
        if !edit.changed {
            tracing::debug!(%scope, list = ?edit.list, "pattern edit changes nothing");
            return Ok(());
        }
        if let Some(source) = &edit.copied_from {
            tracing::debug!(%scope, %source, "copying inherited pattern list before editing");
        }
        self.set_field(root, scope, edit.list.key(), SettingValue::Patterns(edit.patterns.clone()))
    }

    fn commit(&mut self, root: &Path, scope: &ScopeId, keys: Vec<SettingKey>) {
        let event_root = if scope.is_global() {
            self.cache.invalidate_all();
            None
        } else {
            self.cache.invalidate(root);
            Some(root.to_path_buf())
        };
        self.emit(ChangeEvent {
            root: event_root,
            scope: Some(scope.clone()),
            keys,
        });
    }

    fn emit(&self, event: ChangeEvent) {
        for listener in &self.listeners {
            listener.on_settings_changed(&event);
        }
    }
}
