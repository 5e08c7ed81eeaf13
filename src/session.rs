//! Host session
//!
//! Binds one workspace's settings to the derived line-count cache and turns
//! host notifications into cache maintenance:
//! - a saved document is rescanned
//! - a closed document is evicted
//! - a configuration change reloads the settings and reclassifies cached
//!   counts without reading any file
//!
//! Mutations made through [`Session::service_mut`] reach the derived cache
//! through a change listener, so the next read sees fresh severities.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use linelens_cache::{CacheConfig, CacheStats, CachedStats, DerivedValueCache};
use linelens_scanner::{BasicScanner, FileStats, LineScanner, Severity, Thresholds};

use crate::config::EngineConfig;
use crate::patterns::PatternMatcher;
use crate::scope::ScopeId;
use crate::service::{ChangeEvent, ChangeListener, ServiceResult, SettingsService};
use crate::settings::BadgeTarget;

/// Configuration namespace owned by this engine
pub const CONFIG_NAMESPACE: &str = "linelens";

/// Notifications delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    DocumentSaved(PathBuf),
    DocumentClosed(PathBuf),
    ConfigurationChanged { namespace: String },
}

/// What a host paints next to a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoration {
    pub glyph: String,
    pub severity: Severity,
    pub line_count: u64,
    pub tooltip: String,
}

/// Totals over the counted files below a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderStats {
    pub files: usize,
    pub stats: FileStats,
}

/// Marks cached classifications stale when thresholds change.
#[derive(Debug)]
struct ClassificationWatch {
    root: PathBuf,
    stale: AtomicBool,
}

impl ChangeListener for ClassificationWatch {
    fn on_settings_changed(&self, event: &ChangeEvent) {
        if event.concerns(&self.root) && event.affects_classification() {
            self.stale.store(true, Ordering::Release);
        }
    }
}

/// Settings and derived stats for one workspace root.
pub struct Session {
    root: PathBuf,
    service: SettingsService,
    derived: DerivedValueCache,
    scanner: Box<dyn LineScanner>,
    watch: Arc<ClassificationWatch>,
}

impl Session {
    pub fn new(
        root: impl Into<PathBuf>,
        mut service: SettingsService,
        scanner: Box<dyn LineScanner>,
        cache: CacheConfig,
    ) -> Self {
        let root = root.into();
        let watch = Arc::new(ClassificationWatch {
            root: root.clone(),
            stale: AtomicBool::new(false),
        });
        service.add_listener(watch.clone());
        Self {
            root,
            service,
            derived: DerivedValueCache::new(cache),
            scanner,
            watch,
        }
    }

    /// Session over file stores with the built-in scanner.
    pub fn open(root: impl Into<PathBuf>, config: &EngineConfig) -> Self {
        let root = root.into();
        let service = SettingsService::with_file_stores(&root, config);
        Self::new(
            root,
            service,
            Box::new(BasicScanner::default()),
            config.derived_cache(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn service(&self) -> &SettingsService {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut SettingsService {
        &mut self.service
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.derived.stats()
    }

    /// Route a host notification.
    pub fn handle_event(&mut self, event: HostEvent) -> ServiceResult<()> {
        match event {
            HostEvent::DocumentSaved(path) => {
                let path = self.absolute(&path);
                let thresholds = self.thresholds_for(&path)?;
                self.derived.on_saved(&path, self.scanner.as_ref(), thresholds)?;
            }
            HostEvent::DocumentClosed(path) => {
                let path = self.absolute(&path);
                self.derived.on_closed(&path);
            }
            HostEvent::ConfigurationChanged { namespace } => {
                if !is_own_namespace(&namespace) {
                    tracing::debug!(%namespace, "configuration change ignored");
                    return Ok(());
                }
                // Reclassification happens lazily on the next read
                self.service.notify_changed(Some(&self.root));
            }
        }
        Ok(())
    }

    /// Line stats and severity of a file.
    pub fn file_stats(&mut self, path: &Path) -> ServiceResult<CachedStats> {
        self.refresh_classification()?;
        let path = self.absolute(path);
        let thresholds = self.thresholds_for(&path)?;
        Ok(self.derived.get(&path, self.scanner.as_ref(), thresholds)?)
    }

    /// Whether a file passes the include and exclude lists of its directory.
    pub fn is_counted(&self, path: &Path) -> ServiceResult<bool> {
        let path = self.absolute(path);
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return Ok(false);
        };
        let workspace = self.service.workspace(&self.root)?;
        let scope = workspace.tree().scope_for_file(&path);
        Ok(self.service.matcher(&self.root, &scope)?.is_counted(relative))
    }

    /// Sum the stats of every counted file below `dir`.
    ///
    /// Excluded directories are not descended into. Files that disappear
    /// during the walk are skipped.
    pub fn folder_stats(&mut self, dir: &Path) -> ServiceResult<FolderStats> {
        let dir = self.absolute(dir);
        let workspace = self.service.workspace(&self.root)?;
        let tree = workspace.tree().clone();
        let mut matchers: HashMap<ScopeId, PatternMatcher> = HashMap::new();
        let mut totals = FolderStats::default();

        let mut walker = WalkDir::new(&dir).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 && entry.file_type().is_dir() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };

            // Patterns of the directory holding the entry decide its fate
            let scope = tree.scope_for_file(entry.path());
            if !matchers.contains_key(&scope) {
                let matcher = self.service.matcher(&self.root, &scope)?;
                matchers.insert(scope.clone(), matcher);
            }
            let matcher = &matchers[&scope];

            if entry.file_type().is_dir() {
                if matcher.is_excluded(relative) {
                    walker.skip_current_dir();
                }
                continue;
            }
            if !entry.file_type().is_file() || !matcher.is_counted(relative) {
                continue;
            }

            let path = entry.into_path();
            let thresholds = workspace.engine().thresholds(&scope);
            match self.derived.get(&path, self.scanner.as_ref(), thresholds) {
                Ok(cached) => {
                    totals.files += 1;
                    totals.stats = totals.stats.combine(&cached.stats);
                }
                Err(err) => tracing::warn!(path = %path.display(), error = %err, "file skipped"),
            }
        }
        Ok(totals)
    }

    /// Badge for a file or folder; `None` when nothing is counted there.
    pub fn decoration(&mut self, path: &Path) -> ServiceResult<Option<Decoration>> {
        let path = self.absolute(path);

        if path.is_dir() {
            let folder = self.folder_stats(&path)?;
            if folder.files == 0 {
                return Ok(None);
            }
            let workspace = self.service.workspace(&self.root)?;
            let scope = workspace.tree().scope_for_dir(&path);
            let severity = workspace.engine().thresholds(&scope).classify(folder.stats.line_count);
            return Ok(Some(Decoration {
                glyph: workspace.engine().glyph(&scope, BadgeTarget::Folder, severity),
                severity,
                line_count: folder.stats.line_count,
                tooltip: format!(
                    "{} lines in {} files ({})",
                    folder.stats.line_count,
                    folder.files,
                    severity.as_str()
                ),
            }));
        }

        if !self.is_counted(&path)? {
            return Ok(None);
        }
        let cached = self.file_stats(&path)?;
        let workspace = self.service.workspace(&self.root)?;
        let scope = workspace.tree().scope_for_file(&path);
        let stats = cached.stats;
        Ok(Some(Decoration {
            glyph: workspace.engine().glyph(&scope, BadgeTarget::File, cached.severity),
            severity: cached.severity,
            line_count: stats.line_count,
            tooltip: format!(
                "{} lines ({} code, {} comment, {} blank)",
                stats.line_count, stats.code_lines, stats.comment_lines, stats.blank_lines
            ),
        }))
    }

    /// Reclassify cached counts if thresholds changed since the last read.
    /// Returns the number of entries whose severity changed.
    pub fn refresh_classification(&mut self) -> ServiceResult<usize> {
        if !self.watch.stale.load(Ordering::Acquire) {
            return Ok(0);
        }
        let workspace = self.service.workspace(&self.root)?;
        self.watch.stale.store(false, Ordering::Release);

        let tree = workspace.tree();
        let changed = self
            .derived
            .reclassify(|path| workspace.engine().thresholds(&tree.scope_for_file(path)));
        Ok(changed)
    }

    fn thresholds_for(&self, path: &Path) -> ServiceResult<Thresholds> {
        let workspace = self.service.workspace(&self.root)?;
        let scope = workspace.tree().scope_for_file(path);
        Ok(workspace.engine().thresholds(&scope))
    }

    /// Absolute, lexically normalized path; the derived cache key.
    fn absolute(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let mut normalized = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other),
            }
        }
        normalized
    }
}

fn is_own_namespace(namespace: &str) -> bool {
    namespace == CONFIG_NAMESPACE
        || namespace
            .strip_prefix(CONFIG_NAMESPACE)
            .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::RelativePath;
    use crate::settings::{PatternList, SettingKey, SettingValue};
    use crate::store::MemoryStoreFactory;
    use linelens_scanner::ScanError;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Counts how often files are actually read
    struct CountingScanner {
        inner: BasicScanner,
        scans: Arc<AtomicUsize>,
    }

    impl LineScanner for CountingScanner {
        fn scan_file(&self, path: &Path) -> Result<FileStats, ScanError> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.inner.scan_file(path)
        }

        fn scan_text(&self, path: &Path, text: &str) -> FileStats {
            self.inner.scan_text(path, text)
        }
    }

    fn session(root: &Path) -> (Session, Arc<AtomicUsize>) {
        let scans = Arc::new(AtomicUsize::new(0));
        let service = SettingsService::new(Arc::new(MemoryStoreFactory::new()), &EngineConfig::default());
        let scanner = CountingScanner {
            inner: BasicScanner::default(),
            scans: scans.clone(),
        };
        let session = Session::new(root, service, Box::new(scanner), CacheConfig::default());
        (session, scans)
    }

    fn write_lines(path: &Path, n: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let body: String = (0..n).map(|i| format!("let x{} = {};\n", i, i)).collect();
        fs::write(path, body).unwrap();
    }

    fn set_thresholds(session: &mut Session, mid: u64, high: u64) {
        let root = session.root().to_path_buf();
        let service = session.service_mut();
        service
            .set_field(&root, &ScopeId::Root, SettingKey::ThresholdMid, SettingValue::Threshold(mid))
            .unwrap();
        service
            .set_field(&root, &ScopeId::Root, SettingKey::ThresholdHigh, SettingValue::Threshold(high))
            .unwrap();
    }

    #[test]
    fn test_file_decoration() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("src/main.rs");
        write_lines(&file, 5);
        let (mut session, _) = session(temp.path());
        set_thresholds(&mut session, 3, 10);

        let decoration = session.decoration(&file).unwrap().unwrap();
        assert_eq!(decoration.severity, Severity::Warning);
        assert_eq!(decoration.glyph, "🟡");
        assert_eq!(decoration.line_count, 5);
        assert!(decoration.tooltip.starts_with("5 lines"));
    }

    #[test]
    fn test_threshold_change_reclassifies_without_rescan() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.rs");
        write_lines(&file, 5);
        let (mut session, scans) = session(temp.path());

        assert_eq!(session.file_stats(&file).unwrap().severity, Severity::Normal);
        set_thresholds(&mut session, 2, 4);

        assert_eq!(session.file_stats(&file).unwrap().severity, Severity::Danger);
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_save_rescans_and_close_evicts() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.rs");
        write_lines(&file, 2);
        let (mut session, scans) = session(temp.path());
        session.file_stats(&file).unwrap();

        write_lines(&file, 7);
        session.handle_event(HostEvent::DocumentSaved(file.clone())).unwrap();
        assert_eq!(scans.load(Ordering::SeqCst), 2);
        assert_eq!(session.file_stats(&file).unwrap().stats.line_count, 7);

        session.handle_event(HostEvent::DocumentClosed(file.clone())).unwrap();
        assert_eq!(session.cache_stats().entries, 0);
        assert_eq!(session.cache_stats().evictions, 1);
    }

    #[test]
    fn test_configuration_change_namespace() {
        let temp = TempDir::new().unwrap();
        let (mut session, _) = session(temp.path());
        let root = temp.path().to_path_buf();
        session.service().workspace(&root).unwrap();

        session
            .handle_event(HostEvent::ConfigurationChanged {
                namespace: "editor".to_string(),
            })
            .unwrap();
        assert!(session.service().cache().contains(&root));

        session
            .handle_event(HostEvent::ConfigurationChanged {
                namespace: "linelens.thresholds".to_string(),
            })
            .unwrap();
        assert!(!session.service().cache().contains(&root));
    }

    #[test]
    fn test_folder_stats_respects_patterns() {
        let temp = TempDir::new().unwrap();
        write_lines(&temp.path().join("src/a.rs"), 3);
        write_lines(&temp.path().join("src/gen/b.rs"), 100);
        write_lines(&temp.path().join("node_modules/x/index.js"), 50);
        let (mut session, _) = session(temp.path());

        let root = temp.path().to_path_buf();
        let src = ScopeId::Directory(RelativePath::parse("src").unwrap().unwrap());
        session
            .service_mut()
            .add_pattern(&root, &src, PatternList::Exclude, "src/gen")
            .unwrap();

        let totals = session.folder_stats(temp.path()).unwrap();
        assert_eq!(totals.files, 1);
        assert_eq!(totals.stats.line_count, 3);
    }

    #[test]
    fn test_folder_decoration() {
        let temp = TempDir::new().unwrap();
        write_lines(&temp.path().join("lib/a.rs"), 4);
        write_lines(&temp.path().join("lib/b.rs"), 4);
        let (mut session, _) = session(temp.path());
        set_thresholds(&mut session, 5, 100);

        let decoration = session.decoration(&temp.path().join("lib")).unwrap().unwrap();
        assert_eq!(decoration.line_count, 8);
        assert_eq!(decoration.severity, Severity::Warning);
        assert_eq!(decoration.glyph, "🟨");
    }

    #[test]
    fn test_excluded_file_has_no_decoration() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("web/app.min.js");
        write_lines(&file, 3);
        let (mut session, _) = session(temp.path());

        assert!(session.decoration(&file).unwrap().is_none());
        assert!(session.decoration(&temp.path().join("web")).unwrap().is_none());
    }

    #[test]
    fn test_dotted_paths_share_one_cache_entry() {
        let temp = TempDir::new().unwrap();
        write_lines(&temp.path().join("a/x.rs"), 4);
        let (mut session, scans) = session(temp.path());

        session.file_stats(&temp.path().join("a/x.rs")).unwrap();
        session.file_stats(&temp.path().join("a/./b/../x.rs")).unwrap();
        session.file_stats(Path::new("a/x.rs")).unwrap();
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        assert_eq!(session.cache_stats().entries, 1);
    }

    #[test]
    fn test_excluded_default_directory_is_not_descended() {
        let temp = TempDir::new().unwrap();
        write_lines(&temp.path().join("src/a.rs"), 3);
        write_lines(&temp.path().join("node_modules/index.js"), 50);
        let (mut session, scans) = session(temp.path());

        // node_modules itself excludes nothing; only pruning the directory
        // keeps its file out of the totals
        let root = temp.path().to_path_buf();
        let modules = ScopeId::Directory(RelativePath::parse("node_modules").unwrap().unwrap());
        session
            .service_mut()
            .set_field(&root, &modules, SettingKey::ExcludePatterns, SettingValue::Patterns(Vec::new()))
            .unwrap();

        let totals = session.folder_stats(temp.path()).unwrap();
        assert_eq!(totals.files, 1);
        assert_eq!(totals.stats.line_count, 3);
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_namespace_matching() {
        assert!(is_own_namespace("linelens"));
        assert!(is_own_namespace("linelens.badges"));
        assert!(!is_own_namespace("linelensx"));
    }
}
