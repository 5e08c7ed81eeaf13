//! Resolution, editing and cache coherency scenarios through the public
//! service API.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use linelens::store::{
    FileStoreFactory, MemorySettingsStore, MemoryStoreFactory, RetryPolicy, StoreResult, StoreSet,
};
use linelens::{
    ChangeEvent, ChangeListener, EngineConfig, PatternList, RelativePath, ScopeId, ServiceError,
    SettingKey, SettingValue, SettingsRecord, SettingsService, SettingsStore, Source, StoreError,
    StoreFactory,
};

const ROOT: &str = "/workspace";

fn root() -> &'static Path {
    Path::new(ROOT)
}

fn dir(s: &str) -> ScopeId {
    ScopeId::Directory(RelativePath::parse(s).unwrap().unwrap())
}

fn patterns(items: &[&str]) -> SettingValue {
    SettingValue::Patterns(items.iter().map(|s| s.to_string()).collect())
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ChangeEvent>>,
}

impl Recorder {
    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl ChangeListener for Recorder {
    fn on_settings_changed(&self, event: &ChangeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn memory_service() -> (SettingsService, Arc<Recorder>) {
    let mut service = SettingsService::new(Arc::new(MemoryStoreFactory::new()), &EngineConfig::default());
    let recorder = Arc::new(Recorder::default());
    service.add_listener(recorder.clone());
    (service, recorder)
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn test_resolution_is_idempotent() {
    let (mut service, _) = memory_service();
    service
        .set_field(root(), &dir("a"), SettingKey::FileWarning, SettingValue::Glyph("!".into()))
        .unwrap();

    let first = service.resolve(root(), &dir("a/b/c")).unwrap();
    let second = service.resolve(root(), &dir("a/b/c")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_nearest_definition_wins() {
    let (mut service, _) = memory_service();
    let key = SettingKey::ThresholdMid;
    service.set_field(root(), &ScopeId::Global, key, SettingValue::Threshold(1)).unwrap();
    service.set_field(root(), &ScopeId::Root, key, SettingValue::Threshold(2)).unwrap();
    service.set_field(root(), &dir("a"), key, SettingValue::Threshold(3)).unwrap();

    let at = |scope: &ScopeId| service.resolve_field(root(), scope, key).unwrap();
    assert_eq!(at(&dir("a/b")).value, SettingValue::Threshold(3));
    assert_eq!(at(&dir("a/b")).source, Source::from(dir("a")));
    assert_eq!(at(&dir("other")).source, Source::Root);
    assert_eq!(at(&ScopeId::Global).source, Source::Global);
}

#[test]
fn test_end_to_end_thresholds() {
    let (mut service, _) = memory_service();
    service
        .set_field(root(), &ScopeId::Global, SettingKey::ThresholdMid, SettingValue::Threshold(300))
        .unwrap();
    service
        .set_field(root(), &ScopeId::Global, SettingKey::ThresholdHigh, SettingValue::Threshold(1000))
        .unwrap();
    service
        .set_field(root(), &ScopeId::Root, SettingKey::ThresholdMid, SettingValue::Threshold(500))
        .unwrap();

    let resolved = service.resolve(root(), &ScopeId::Root).unwrap();
    let mid = &resolved[&SettingKey::ThresholdMid];
    let high = &resolved[&SettingKey::ThresholdHigh];
    assert_eq!((mid.value.clone(), mid.source.clone()), (SettingValue::Threshold(500), Source::Root));
    assert_eq!((high.value.clone(), high.source.clone()), (SettingValue::Threshold(1000), Source::Global));
}

// =============================================================================
// Lists
// =============================================================================

#[test]
fn test_list_override_does_not_merge() {
    let (mut service, _) = memory_service();
    service
        .set_field(root(), &ScopeId::Root, SettingKey::ExcludePatterns, patterns(&["**/a"]))
        .unwrap();
    service
        .set_field(root(), &dir("d"), SettingKey::ExcludePatterns, patterns(&["**/b"]))
        .unwrap();

    let resolved = service.resolve_field(root(), &dir("d"), SettingKey::ExcludePatterns).unwrap();
    assert_eq!(resolved.value, patterns(&["**/b"]));
}

#[test]
fn test_copy_on_first_write() {
    let (mut service, _) = memory_service();
    service
        .set_field(root(), &ScopeId::Root, SettingKey::ExcludePatterns, patterns(&["**/a", "**/b"]))
        .unwrap();

    service.remove_pattern(root(), &dir("d"), PatternList::Exclude, "**/a").unwrap();

    let local = service.resolve_field(root(), &dir("d"), SettingKey::ExcludePatterns).unwrap();
    assert_eq!(local.value, patterns(&["**/b"]));
    assert_eq!(local.source, Source::from(dir("d")));

    // The ancestor keeps its full list
    let parent = service.resolve_field(root(), &ScopeId::Root, SettingKey::ExcludePatterns).unwrap();
    assert_eq!(parent.value, patterns(&["**/a", "**/b"]));
}

#[test]
fn test_add_of_inherited_pattern_pins_the_list() {
    let (mut service, recorder) = memory_service();
    service
        .set_field(root(), &ScopeId::Root, SettingKey::ExcludePatterns, patterns(&["/a", "/b"]))
        .unwrap();

    let edit = service.add_pattern(root(), &dir("d"), PatternList::Exclude, "a").unwrap();
    assert!(edit.changed);
    assert_eq!(edit.copied_from, Some(Source::Root));
    assert_eq!(recorder.count(), 2);

    service
        .set_field(root(), &ScopeId::Root, SettingKey::ExcludePatterns, patterns(&["/b"]))
        .unwrap();
    let local = service.resolve_field(root(), &dir("d"), SettingKey::ExcludePatterns).unwrap();
    assert_eq!(local.value, patterns(&["/a", "/b"]));
    assert_eq!(local.source, Source::from(dir("d")));

    // Already local: nothing to do
    let again = service.add_pattern(root(), &dir("d"), PatternList::Exclude, "/a").unwrap();
    assert!(!again.changed);
    assert_eq!(recorder.count(), 3);
}

#[test]
fn test_empty_list_override_differs_from_reset() {
    let (mut service, _) = memory_service();
    service
        .set_field(root(), &ScopeId::Root, SettingKey::IncludePatterns, patterns(&["src/**"]))
        .unwrap();
    service
        .set_field(root(), &dir("d"), SettingKey::IncludePatterns, patterns(&["/only"]))
        .unwrap();

    service.remove_pattern(root(), &dir("d"), PatternList::Include, "/only").unwrap();
    let emptied = service.resolve_field(root(), &dir("d"), SettingKey::IncludePatterns).unwrap();
    assert_eq!(emptied.value, patterns(&[]));
    assert_eq!(emptied.source, Source::from(dir("d")));

    assert!(service.reset_field(root(), &dir("d"), SettingKey::IncludePatterns).unwrap());
    let reset = service.resolve_field(root(), &dir("d"), SettingKey::IncludePatterns).unwrap();
    assert_eq!(reset.value, patterns(&["src/**"]));
    assert_eq!(reset.source, Source::Root);
}

// =============================================================================
// Reset
// =============================================================================

#[test]
fn test_reset_restores_inheritance_and_is_idempotent() {
    let (mut service, recorder) = memory_service();
    let key = SettingKey::FolderDanger;
    service.set_field(root(), &ScopeId::Root, key, SettingValue::Glyph("R".into())).unwrap();
    service.set_field(root(), &dir("x"), key, SettingValue::Glyph("X".into())).unwrap();

    assert!(service.reset_field(root(), &dir("x"), key).unwrap());
    let after = service.resolve_field(root(), &dir("x"), key).unwrap();
    assert_eq!(after.value, SettingValue::Glyph("R".into()));
    assert_eq!(after.source, Source::Root);

    let events = recorder.count();
    assert!(!service.reset_field(root(), &dir("x"), key).unwrap());
    assert_eq!(recorder.count(), events);
    assert_eq!(service.resolve_field(root(), &dir("x"), key).unwrap(), after);
}

// =============================================================================
// Cache coherency
// =============================================================================

#[test]
fn test_read_after_write_through_cache() {
    let (mut service, _) = memory_service();
    let key = SettingKey::ThresholdHigh;

    // Warm the cache first so the write has something to invalidate
    assert_eq!(
        service.resolve_field(root(), &dir("a"), key).unwrap().source,
        Source::Default
    );
    assert!(service.cache().contains(root()));

    service.set_field(root(), &dir("a"), key, SettingValue::Threshold(42)).unwrap();
    assert_eq!(
        service.resolve_field(root(), &dir("a"), key).unwrap().value,
        SettingValue::Threshold(42)
    );
}

#[test]
fn test_file_stores_survive_restart() {
    let temp = TempDir::new().unwrap();
    let ws = temp.path().join("ws");
    let global = temp.path().join("global.json");
    let factory = || Arc::new(FileStoreFactory::new(".linelens", &global, RetryPolicy::none()));
    let config = EngineConfig::default();

    let mut first = SettingsService::new(factory(), &config);
    first
        .set_field(&ws, &dir("src"), SettingKey::FileDanger, SettingValue::Glyph("🔥".into()))
        .unwrap();
    first.add_pattern(&ws, &ScopeId::Root, PatternList::Exclude, "vendor").unwrap();

    let second = SettingsService::new(factory(), &config);
    let glyph = second.resolve_field(&ws, &dir("src/deep"), SettingKey::FileDanger).unwrap();
    assert_eq!(glyph.value, SettingValue::Glyph("🔥".into()));
    let entries = second.patterns_with_source(&ws, &ScopeId::Root, PatternList::Exclude).unwrap();
    assert_eq!(entries.last().unwrap().pattern, "/vendor");
    assert!(ws.join(".linelens/settings.json").exists());
}

// =============================================================================
// Persistence failure
// =============================================================================

/// Workspace store whose writes can be switched off.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemorySettingsStore,
    broken: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> StoreResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("flaky.json"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }
}

impl SettingsStore for FlakyStore {
    fn get(&self, scope: &ScopeId) -> StoreResult<Option<SettingsRecord>> {
        self.inner.get(scope)
    }

    fn put(&self, scope: &ScopeId, record: SettingsRecord) -> StoreResult<()> {
        self.check()?;
        self.inner.put(scope, record)
    }

    fn delete(&self, scope: &ScopeId, key: SettingKey) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(scope, key)
    }

    fn remove_scope(&self, scope: &ScopeId) -> StoreResult<bool> {
        self.check()?;
        self.inner.remove_scope(scope)
    }

    fn list_scopes_with_settings(&self) -> StoreResult<Vec<ScopeId>> {
        self.inner.list_scopes_with_settings()
    }
}

struct FlakyFactory {
    global: Arc<MemorySettingsStore>,
    workspace: Arc<FlakyStore>,
}

impl StoreFactory for FlakyFactory {
    fn open(&self, _root: &Path) -> StoreResult<StoreSet> {
        Ok(StoreSet::new(self.global.clone(), self.workspace.clone()))
    }
}

#[test]
fn test_persistence_failure_leaves_caches_and_listeners_untouched() {
    let workspace = Arc::new(FlakyStore::default());
    let factory = FlakyFactory {
        global: Arc::new(MemorySettingsStore::new()),
        workspace: workspace.clone(),
    };
    let mut service = SettingsService::new(Arc::new(factory), &EngineConfig::default());
    let recorder = Arc::new(Recorder::default());
    service.add_listener(recorder.clone());

    let key = SettingKey::ThresholdMid;
    service.set_field(root(), &ScopeId::Root, key, SettingValue::Threshold(100)).unwrap();
    let before = service.workspace(root()).unwrap();
    assert_eq!(recorder.count(), 1);

    workspace.broken.store(true, Ordering::SeqCst);
    let err = service
        .set_field(root(), &ScopeId::Root, key, SettingValue::Threshold(200))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(StoreError::Io { .. })));
    let err = service.reset_field(root(), &ScopeId::Root, key).unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));
    let err = service
        .add_pattern(root(), &ScopeId::Root, PatternList::Exclude, "gen")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));

    // Same snapshot still cached, nobody was told about a change
    let after = service.workspace(root()).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(recorder.count(), 1);
    assert_eq!(
        service.resolve_field(root(), &ScopeId::Root, key).unwrap().value,
        SettingValue::Threshold(100)
    );
}
