//! Inheritance-aware resolution
//!
//! The engine holds an immutable snapshot of every record visible to one
//! workspace. Resolving a key walks the scope chain nearest-first and returns
//! the first value found together with the scope that supplied it. Values
//! never merge across scopes, lists included.

use serde::Serialize;
use std::collections::BTreeMap;

use linelens_scanner::{Severity, Thresholds};

use crate::scope::{ScopeId, ScopeTree, Source};
use crate::settings::{BadgeTarget, BuiltinDefaults, PatternList, SettingKey, SettingValue, SettingsRecord};

/// A resolved value and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub value: SettingValue,
    pub source: Source,
}

/// Every known key resolved for one scope.
pub type ResolvedSettings = BTreeMap<SettingKey, Resolved>;

/// Read-only resolution over a snapshot of a workspace's records.
#[derive(Debug, Clone)]
pub struct ResolutionEngine {
    tree: ScopeTree,
    records: BTreeMap<ScopeId, SettingsRecord>,
    defaults: BuiltinDefaults,
}

impl ResolutionEngine {
    pub fn new(
        tree: ScopeTree,
        records: BTreeMap<ScopeId, SettingsRecord>,
        defaults: BuiltinDefaults,
    ) -> Self {
        Self {
            tree,
            records,
            defaults,
        }
    }

    pub fn tree(&self) -> &ScopeTree {
        &self.tree
    }

    /// Record explicitly stored at `scope`.
    pub fn record(&self, scope: &ScopeId) -> Option<&SettingsRecord> {
        self.records.get(scope)
    }

    /// Whether `scope` defines `key` itself (not inherited).
    pub fn is_local(&self, scope: &ScopeId, key: SettingKey) -> bool {
        self.record(scope).is_some_and(|r| r.contains(key))
    }

    /// Scopes that hold at least one explicit setting.
    pub fn scopes_with_settings(&self) -> impl Iterator<Item = &ScopeId> {
        self.records.keys()
    }

    /// Effective value of `key` at `scope`.
    pub fn resolve_field(&self, scope: &ScopeId, key: SettingKey) -> Resolved {
        self.resolve_from(scope.chain(), key)
    }

    /// Value `scope` would see if it did not define `key` itself.
    pub fn inherited(&self, scope: &ScopeId, key: SettingKey) -> Resolved {
        match scope.parent() {
            Some(parent) => self.resolve_field(&parent, key),
            None => self.default_for(key),
        }
    }

    /// Pointwise resolution of every known key.
    pub fn resolve(&self, scope: &ScopeId) -> ResolvedSettings {
        let chain = scope.chain();
        SettingKey::ALL
            .iter()
            .map(|key| (*key, self.resolve_from(chain.clone(), *key)))
            .collect()
    }

    /// Effective severity thresholds at `scope`.
    pub fn thresholds(&self, scope: &ScopeId) -> Thresholds {
        Thresholds::new(
            self.threshold(scope, SettingKey::ThresholdMid, self.defaults.threshold_mid),
            self.threshold(scope, SettingKey::ThresholdHigh, self.defaults.threshold_high),
        )
    }

    /// Effective badge glyph at `scope`.
    pub fn glyph(&self, scope: &ScopeId, target: BadgeTarget, severity: Severity) -> String {
        let key = SettingKey::badge(target, severity);
        match self.resolve_field(scope, key).value {
            SettingValue::Glyph(g) => g,
            other => {
                tracing::warn!(%key, value = %other, "badge setting is not a glyph, using default");
                self.defaults.value_for(key).to_string()
            }
        }
    }

    /// Effective pattern list at `scope`.
    pub fn patterns(&self, scope: &ScopeId, list: PatternList) -> (Vec<String>, Source) {
        let resolved = self.resolve_field(scope, list.key());
        match resolved.value {
            SettingValue::Patterns(p) => (p, resolved.source),
            _ => (Vec::new(), resolved.source),
        }
    }

    fn threshold(&self, scope: &ScopeId, key: SettingKey, fallback: u64) -> u64 {
        self.resolve_field(scope, key)
            .value
            .as_threshold()
            .unwrap_or(fallback)
    }

    fn resolve_from(&self, chain: Vec<ScopeId>, key: SettingKey) -> Resolved {
        for scope in chain {
            if let Some(value) = self.records.get(&scope).and_then(|r| r.get(key)) {
                return Resolved {
                    value: value.clone(),
                    source: scope.into(),
                };
            }
        }
        self.default_for(key)
    }

    fn default_for(&self, key: SettingKey) -> Resolved {
        Resolved {
            value: self.defaults.value_for(key),
            source: Source::Default,
        }
    }
}
