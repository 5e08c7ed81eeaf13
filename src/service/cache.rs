//! Per-root workspace cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::resolve::ResolutionEngine;
use crate::scope::ScopeTree;
use crate::settings::BuiltinDefaults;
use crate::store::{StoreError, StoreFactory, StoreResult, StoreSet};

/// A loaded workspace: its stores and a resolution snapshot of their records.
#[derive(Debug)]
pub struct Workspace {
    engine: ResolutionEngine,
    stores: StoreSet,
}

impl Workspace {
    /// Load every record visible from `root` into a fresh snapshot.
    pub fn load(root: &Path, stores: StoreSet, defaults: BuiltinDefaults) -> StoreResult<Self> {
        let records = stores.load_all()?;
        Ok(Self {
            engine: ResolutionEngine::new(ScopeTree::new(root), records, defaults),
            stores,
        })
    }

    pub fn root(&self) -> &Path {
        self.engine.tree().root()
    }

    pub fn tree(&self) -> &ScopeTree {
        self.engine.tree()
    }

    pub fn engine(&self) -> &ResolutionEngine {
        &self.engine
    }

    pub fn stores(&self) -> &StoreSet {
        &self.stores
    }
}

#[derive(Debug)]
struct Slot {
    workspace: Arc<Workspace>,
    last_access: u64,
}

#[derive(Debug, Default)]
struct Slots {
    entries: HashMap<PathBuf, Slot>,
    tick: u64,
}

/// Registry of loaded workspaces keyed by root.
///
/// Workspaces are built on first use and dropped by [`invalidate`]; the
/// next access reloads them from the stores. Holds at most
/// `max_workspaces` roots, dropping the least recently used.
///
/// [`invalidate`]: ServiceCache::invalidate
pub struct ServiceCache {
    factory: Arc<dyn StoreFactory>,
    defaults: BuiltinDefaults,
    max_workspaces: usize,
    slots: Mutex<Slots>,
}

impl std::fmt::Debug for ServiceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCache")
            .field("max_workspaces", &self.max_workspaces)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ServiceCache {
    pub fn new(factory: Arc<dyn StoreFactory>, defaults: BuiltinDefaults, max_workspaces: usize) -> Self {
        Self {
            factory,
            defaults,
            max_workspaces: max_workspaces.max(1),
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Workspace for `root`, loading it if needed.
    pub fn get(&self, root: &Path) -> StoreResult<Arc<Workspace>> {
        let mut slots = self.lock()?;
        slots.tick += 1;
        let tick = slots.tick;

        if let Some(slot) = slots.entries.get_mut(root) {
            slot.last_access = tick;
            return Ok(slot.workspace.clone());
        }

        let stores = self.factory.open(root)?;
        let workspace = Arc::new(Workspace::load(root, stores, self.defaults.clone())?);
        tracing::debug!(root = %root.display(), "workspace settings loaded");

        if slots.entries.len() >= self.max_workspaces {
            let oldest = slots
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_access)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                slots.entries.remove(&oldest);
                tracing::debug!(root = %oldest.display(), "workspace dropped from cache");
            }
        }

        slots.entries.insert(
            root.to_path_buf(),
            Slot {
                workspace: workspace.clone(),
                last_access: tick,
            },
        );
        Ok(workspace)
    }

    /// Drop the cached workspace for `root`. Returns whether one was cached.
    pub fn invalidate(&self, root: &Path) -> bool {
        let removed = match self.slots.lock() {
            Ok(mut slots) => slots.entries.remove(root).is_some(),
            Err(poisoned) => poisoned.into_inner().entries.remove(root).is_some(),
        };
        tracing::debug!(root = %root.display(), removed, "workspace cache invalidated");
        removed
    }

    /// Drop every cached workspace.
    pub fn invalidate_all(&self) {
        match self.slots.lock() {
            Ok(mut slots) => slots.entries.clear(),
            Err(poisoned) => poisoned.into_inner().entries.clear(),
        }
        tracing::debug!("workspace cache cleared");
    }

    pub fn contains(&self, root: &Path) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.entries.contains_key(root))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn defaults(&self) -> &BuiltinDefaults {
        &self.defaults
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Slots>> {
        self.slots
            .lock()
            .map_err(|_| StoreError::Unavailable("workspace cache lock poisoned".to_string()))
    }
}
