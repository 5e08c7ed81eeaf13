//! Glob pattern lists
//!
//! Pattern lists resolve like every other setting (nearest defining scope
//! wins, no merging). The first local edit of an inherited list copies the
//! whole inherited list into the scope before changing it; ancestors are
//! never edited from below.

mod matcher;
mod normalize;

pub use matcher::{MatcherError, PatternMatcher};
pub use normalize::{is_glob, is_rooted, normalize_pattern};

use serde::Serialize;

use crate::resolve::ResolutionEngine;
use crate::scope::{ScopeId, ScopeLevel, Source};
use crate::settings::{PatternList, SettingsError};

/// One effective pattern with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub source: Source,
    /// Level of the supplying scope; `None` for built-in defaults
    pub level: Option<ScopeLevel>,
}

impl PatternEntry {
    /// Whether the entry is defined at `scope` itself, i.e. removable there
    /// without copying.
    pub fn is_local(&self, scope: &ScopeId) -> bool {
        self.source.is_scope(scope)
    }
}

/// Result of planning an edit: the full local list to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEdit {
    pub list: PatternList,
    /// The complete list to store at the scope
    pub patterns: Vec<String>,
    /// Set when the list was copied from an ancestor before editing
    pub copied_from: Option<Source>,
    /// False when the edit would not change the effective list
    pub changed: bool,
}

/// Pattern list operations over a resolution snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PatternAccumulator<'a> {
    engine: &'a ResolutionEngine,
}

impl<'a> PatternAccumulator<'a> {
    pub fn new(engine: &'a ResolutionEngine) -> Self {
        Self { engine }
    }

    /// Effective patterns at `scope`, in order, tagged with their source.
    pub fn patterns_with_source(&self, scope: &ScopeId, list: PatternList) -> Vec<PatternEntry> {
        let (patterns, source) = self.engine.patterns(scope, list);
        let level = source.level();
        patterns
            .into_iter()
            .map(|pattern| PatternEntry {
                pattern,
                source: source.clone(),
                level,
            })
            .collect()
    }

    /// Plan adding `raw` to the list at `scope`.
    ///
    /// An inherited list is always copied to `scope`, even when it already
    /// holds the pattern. Only a local list that already has it is left alone.
    pub fn plan_add(
        &self,
        scope: &ScopeId,
        list: PatternList,
        raw: &str,
    ) -> Result<PatternEdit, SettingsError> {
        let pattern = normalize_pattern(raw)?;
        let (mut patterns, copied_from) = self.local_base(scope, list);

        let present = patterns.iter().any(|p| p == &pattern);
        if present && copied_from.is_none() {
            return Ok(PatternEdit {
                list,
                patterns,
                copied_from: None,
                changed: false,
            });
        }

        if !present {
            patterns.push(pattern);
        }
        Ok(PatternEdit {
            list,
            patterns,
            copied_from,
            changed: true,
        })
    }

    /// Plan removing `raw` from the list at `scope`.
    ///
    /// Removes one entry: the pattern as given, or its normalized form when
    /// the exact string is absent. An emptied list stays as an explicit
    /// empty override.
    pub fn plan_remove(
        &self,
        scope: &ScopeId,
        list: PatternList,
        raw: &str,
    ) -> Result<PatternEdit, SettingsError> {
        let trimmed = raw.trim();
        let normalized = normalize_pattern(raw).unwrap_or_else(|_| trimmed.to_string());
        let (mut patterns, copied_from) = self.local_base(scope, list);

        let target = if patterns.iter().any(|p| p == trimmed) {
            trimmed
        } else {
            normalized.as_str()
        };
        let before = patterns.len();
        patterns.retain(|p| p != target);
        let changed = patterns.len() != before;

        Ok(PatternEdit {
            list,
            patterns,
            copied_from: if changed { copied_from } else { None },
            changed,
        })
    }

    /// The list to edit at `scope`: its own, or a copy of the inherited one.
    fn local_base(&self, scope: &ScopeId, list: PatternList) -> (Vec<String>, Option<Source>) {
        let key = list.key();
        if let Some(local) = self
            .engine
            .record(scope)
            .and_then(|r| r.get(key))
            .and_then(|v| v.as_patterns())
        {
            return (local.to_vec(), None);
        }

        let (inherited, source) = self.engine.patterns(scope, list);
        (inherited, Some(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{RelativePath, ScopeTree};
    use crate::settings::{BuiltinDefaults, SettingKey, SettingValue, SettingsRecord};
    use std::collections::BTreeMap;

    fn dir(s: &str) -> ScopeId {
        ScopeId::Directory(RelativePath::parse(s).unwrap().unwrap())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn engine(entries: Vec<(ScopeId, Vec<&str>)>) -> ResolutionEngine {
        let mut records: BTreeMap<ScopeId, SettingsRecord> = BTreeMap::new();
        for (scope, patterns) in entries {
            records
                .entry(scope)
                .or_default()
                .set(SettingKey::ExcludePatterns, SettingValue::Patterns(strings(&patterns)))
                .unwrap();
        }
        ResolutionEngine::new(ScopeTree::new("/ws"), records, BuiltinDefaults::default())
    }

    #[test]
    fn test_patterns_with_source() {
        let e = engine(vec![(ScopeId::Root, vec!["**/a", "**/b"])]);
        let entries = PatternAccumulator::new(&e).patterns_with_source(&dir("d"), PatternList::Exclude);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pattern, "**/a");
        assert_eq!(entries[1].source, Source::Root);
        assert_eq!(entries[1].level, Some(ScopeLevel::Root));
        assert!(!entries[0].is_local(&dir("d")));
        assert!(entries[0].is_local(&ScopeId::Root));
    }

    #[test]
    fn test_add_copies_inherited_list_first() {
        let e = engine(vec![(ScopeId::Root, vec!["**/a", "**/b"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_add(&dir("d"), PatternList::Exclude, "**/c")
            .unwrap();
        assert!(edit.changed);
        assert_eq!(edit.patterns, strings(&["**/a", "**/b", "**/c"]));
        assert_eq!(edit.copied_from, Some(Source::Root));
    }

    #[test]
    fn test_add_to_local_list_dedups() {
        let e = engine(vec![(dir("d"), vec!["/x"])]);
        let acc = PatternAccumulator::new(&e);

        let edit = acc.plan_add(&dir("d"), PatternList::Exclude, "x").unwrap();
        assert!(!edit.changed);
        assert_eq!(edit.patterns, strings(&["/x"]));

        let edit = acc.plan_add(&dir("d"), PatternList::Exclude, "y").unwrap();
        assert_eq!(edit.patterns, strings(&["/x", "/y"]));
        assert_eq!(edit.copied_from, None);
    }

    #[test]
    fn test_add_inherited_duplicate_still_copies() {
        let e = engine(vec![(ScopeId::Root, vec!["/a", "/b"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_add(&dir("d"), PatternList::Exclude, "a")
            .unwrap();
        assert!(edit.changed);
        assert_eq!(edit.patterns, strings(&["/a", "/b"]));
        assert_eq!(edit.copied_from, Some(Source::Root));
    }

    #[test]
    fn test_remove_takes_exact_entry_only() {
        let e = engine(vec![(dir("d"), vec!["vendor", "/vendor"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_remove(&dir("d"), PatternList::Exclude, "vendor")
            .unwrap();
        assert_eq!(edit.patterns, strings(&["/vendor"]));

        let e = engine(vec![(dir("d"), vec!["/vendor", "**/keep"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_remove(&dir("d"), PatternList::Exclude, "vendor")
            .unwrap();
        assert!(edit.changed);
        assert_eq!(edit.patterns, strings(&["**/keep"]));
    }

    #[test]
    fn test_remove_inherited_copies_then_filters() {
        let e = engine(vec![(ScopeId::Root, vec!["**/a", "**/b"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_remove(&dir("d"), PatternList::Exclude, "**/a")
            .unwrap();
        assert!(edit.changed);
        assert_eq!(edit.patterns, strings(&["**/b"]));
        assert_eq!(edit.copied_from, Some(Source::Root));
    }

    #[test]
    fn test_remove_last_pattern_leaves_empty_override() {
        let e = engine(vec![(ScopeId::Root, vec!["**/a"]), (dir("d"), vec!["/only"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_remove(&dir("d"), PatternList::Exclude, "only")
            .unwrap();
        assert!(edit.changed);
        assert!(edit.patterns.is_empty());
    }

    #[test]
    fn test_remove_missing_pattern_is_noop() {
        let e = engine(vec![(ScopeId::Root, vec!["**/a"])]);
        let edit = PatternAccumulator::new(&e)
            .plan_remove(&dir("d"), PatternList::Exclude, "**/zzz")
            .unwrap();
        assert!(!edit.changed);
        assert_eq!(edit.copied_from, None);
    }

    #[test]
    fn test_add_invalid_pattern() {
        let e = engine(vec![]);
        let result = PatternAccumulator::new(&e).plan_add(&ScopeId::Root, PatternList::Include, "[");
        assert!(matches!(result, Err(SettingsError::InvalidPattern { .. })));
    }
}
