//! Per-file line statistics cache
//!
//! Two invalidation paths:
//! - a save (or a fingerprint mismatch) rescans the file
//! - a configuration change only re-evaluates the severity of the counts
//!   already held; raw counts do not depend on configuration
//!
//! Entries are evicted when the host closes the owning document, and the
//! cache never holds more than `max_entries` files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use linelens_scanner::{FileStats, LineScanner, Severity, Thresholds};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::{CacheError, CacheResult};

/// Configuration for the derived value cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on cached files
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 512 }
    }
}

/// Cached raw stats plus their classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedStats {
    pub stats: FileStats,
    pub severity: Severity,
    /// Thresholds the severity was computed against
    pub thresholds: Thresholds,
}

impl CachedStats {
    fn classify(stats: FileStats, thresholds: Thresholds) -> Self {
        Self {
            stats,
            severity: thresholds.classify(stats.line_count),
            thresholds,
        }
    }
}

/// Counters for cache behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub rescans: u64,
    pub reclassified: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct Entry {
    cached: CachedStats,
    /// None for stats computed from unsaved document text
    fingerprint: Option<Fingerprint>,
    last_access: u64,
}

/// Memoizes [`FileStats`] per file path.
#[derive(Debug, Default)]
pub struct DerivedValueCache {
    config: CacheConfig,
    entries: HashMap<PathBuf, Entry>,
    tick: u64,
    stats: CacheStats,
}

impl DerivedValueCache {
    /// Create a new cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    /// Get stats for a file, scanning it if it is not cached or changed on disk.
    ///
    /// A cached entry whose thresholds differ from `thresholds` is
    /// reclassified in place without rescanning.
    pub fn get(
        &mut self,
        path: &Path,
        scanner: &dyn LineScanner,
        thresholds: Thresholds,
    ) -> CacheResult<CachedStats> {
        let fingerprint = match Fingerprint::of(path) {
            Ok(fp) => fp,
            Err(source) => {
                // The file vanished; whatever we held is stale
                self.entries.remove(path);
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let tick = self.next_tick();
        if let Some(entry) = self.entries.get_mut(path) {
            if entry.fingerprint == Some(fingerprint) {
                entry.last_access = tick;
                if entry.cached.thresholds != thresholds {
                    entry.cached = CachedStats::classify(entry.cached.stats, thresholds);
                    self.stats.reclassified += 1;
                }
                self.stats.hits += 1;
                return Ok(entry.cached);
            }
            tracing::debug!(path = %path.display(), "fingerprint changed, rescanning");
        }

        self.stats.misses += 1;
        self.scan_and_store(path, scanner, thresholds, fingerprint)
    }

    /// Record stats for unsaved document text.
    ///
    /// The entry carries no fingerprint, so the next [`get`](Self::get)
    /// rescans the file on disk.
    pub fn update_from_text(
        &mut self,
        path: &Path,
        text: &str,
        scanner: &dyn LineScanner,
        thresholds: Thresholds,
    ) -> CachedStats {
        let cached = CachedStats::classify(scanner.scan_text(path, text), thresholds);
        self.insert(path.to_path_buf(), cached, None);
        cached
    }

    /// Handle a save of `path`: drop the raw counts and rescan.
    pub fn on_saved(
        &mut self,
        path: &Path,
        scanner: &dyn LineScanner,
        thresholds: Thresholds,
    ) -> CacheResult<CachedStats> {
        self.entries.remove(path);
        let fingerprint = Fingerprint::of(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.stats.rescans += 1;
        self.scan_and_store(path, scanner, thresholds, fingerprint)
    }

    /// Re-evaluate every cached classification against fresh thresholds.
    ///
    /// No file is read. Returns the number of entries whose severity changed.
    pub fn reclassify<F>(&mut self, thresholds_for: F) -> usize
    where
        F: Fn(&Path) -> Thresholds,
    {
        let mut changed = 0;
        for (path, entry) in self.entries.iter_mut() {
            let thresholds = thresholds_for(path);
            if entry.cached.thresholds == thresholds {
                continue;
            }
            let previous = entry.cached.severity;
            entry.cached = CachedStats::classify(entry.cached.stats, thresholds);
            self.stats.reclassified += 1;
            if entry.cached.severity != previous {
                changed += 1;
            }
        }
        tracing::debug!(changed, "reclassified cached line counts");
        changed
    }

    /// Evict the entry for a closed document. Returns whether one existed.
    pub fn on_closed(&mut self, path: &Path) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.stats.evictions += 1;
        }
        removed
    }

    /// Look at a cached entry without touching the file system.
    pub fn peek(&self, path: &Path) -> Option<&CachedStats> {
        self.entries.get(path).map(|e| &e.cached)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats
        }
    }

    fn scan_and_store(
        &mut self,
        path: &Path,
        scanner: &dyn LineScanner,
        thresholds: Thresholds,
        fingerprint: Fingerprint,
    ) -> CacheResult<CachedStats> {
        let stats = scanner.scan_file(path)?;
        let cached = CachedStats::classify(stats, thresholds);
        self.insert(path.to_path_buf(), cached, Some(fingerprint));
        Ok(cached)
    }

    fn insert(&mut self, path: PathBuf, cached: CachedStats, fingerprint: Option<Fingerprint>) {
        if !self.entries.contains_key(&path) {
            self.evict_until_room();
        }
        let last_access = self.next_tick();
        self.entries.insert(
            path,
            Entry {
                cached,
                fingerprint,
                last_access,
            },
        );
    }

    fn evict_until_room(&mut self) {
        let max = self.config.max_entries.max(1);
        while self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(p, _)| p.clone());
            match oldest {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "evicting least recently used entry");
                    self.entries.remove(&path);
                    self.stats.evictions += 1;
                }
                None => break,
            }
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
