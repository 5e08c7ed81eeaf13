//! Migration from legacy per-directory settings files
//!
//! Older releases kept a `.linelens.json` file in every configured
//! directory. Migration folds each file into the record of the directory's
//! scope, then deletes the file. Files are handled independently: a broken
//! file is reported and left in place while the rest of the batch goes on.
//! Running the migration again finds nothing left to do.

mod legacy;

pub use legacy::{parse_legacy, LegacyError, LegacySettings};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::scope::{ScopeId, ScopeTree};
use crate::settings::SettingKey;
use crate::store::SettingsStore;

/// Directories never searched for legacy files
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Category of a per-file migration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationErrorKind {
    /// Not valid JSON, or not an object
    Parse,
    /// Reading, writing the record, or deleting the file failed
    Io,
    /// A value did not fit its key
    Settings,
    /// The file's directory is not inside the workspace
    Path,
}

/// One legacy file that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    pub path: PathBuf,
    pub kind: MigrationErrorKind,
    pub message: String,
}

/// One legacy file folded into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedFile {
    pub path: PathBuf,
    pub scope: ScopeId,
    /// SHA-256 of the legacy file bytes
    pub digest: String,
    /// Schema keys written to the scope's record
    pub keys: Vec<SettingKey>,
    /// Legacy keys without a schema counterpart
    pub ignored: Vec<String>,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Number of legacy files written to the store and removed
    pub migrated: usize,
    pub files: Vec<MigratedFile>,
    pub errors: Vec<MigrationFailure>,
}

impl MigrationReport {
    /// Whether any record was written.
    pub fn wrote_records(&self) -> bool {
        self.files.iter().any(|f| !f.keys.is_empty())
    }

    /// Every schema key written, deduplicated.
    pub fn keys(&self) -> Vec<SettingKey> {
        let mut keys: Vec<SettingKey> = self.files.iter().flat_map(|f| f.keys.iter().copied()).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Finds and converts legacy files under one workspace root.
#[derive(Debug)]
pub struct MigrationAdapter<'a> {
    tree: &'a ScopeTree,
    store: &'a dyn SettingsStore,
    legacy_file_name: &'a str,
}

impl<'a> MigrationAdapter<'a> {
    /// `store` must be the workspace store (Root and Directory scopes).
    pub fn new(tree: &'a ScopeTree, store: &'a dyn SettingsStore, legacy_file_name: &'a str) -> Self {
        Self {
            tree,
            store,
            legacy_file_name,
        }
    }

    /// Legacy files under the root, in path order.
    pub fn find_legacy_files(&self) -> (Vec<PathBuf>, Vec<MigrationFailure>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(self.tree.root())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && entry.file_name() == self.legacy_file_name {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    let path = err.path().unwrap_or(self.tree.root()).to_path_buf();
                    tracing::warn!(path = %path.display(), error = %err, "cannot walk directory");
                    errors.push(MigrationFailure {
                        path,
                        kind: MigrationErrorKind::Io,
                        message: err.to_string(),
                    });
                }
            }
        }
        (files, errors)
    }

    /// Migrate every legacy file, deleting each one after its record is written.
    pub fn migrate_and_cleanup(&self) -> MigrationReport {
        let (files, errors) = self.find_legacy_files();
        let mut report = MigrationReport {
            errors,
            ..Default::default()
        };

        for path in files {
            match self.migrate_file(&path) {
                Ok(migrated) => {
                    let removal = fs::remove_file(&path);
                    report.files.push(migrated);
                    match removal {
                        Ok(()) => report.migrated += 1,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "migrated but could not delete legacy file");
                            report.errors.push(MigrationFailure {
                                path,
                                kind: MigrationErrorKind::Io,
                                message: format!("delete failed: {}", e),
                            });
                        }
                    }
                }
                Err(failure) => {
                    tracing::warn!(
                        path = %failure.path.display(),
                        kind = ?failure.kind,
                        error = %failure.message,
                        "legacy settings file not migrated"
                    );
                    report.errors.push(failure);
                }
            }
        }

        tracing::info!(
            root = %self.tree.root().display(),
            migrated = report.migrated,
            failed = report.errors.len(),
            "legacy migration finished"
        );
        report
    }

    fn migrate_file(&self, path: &Path) -> Result<MigratedFile, MigrationFailure> {
        let failure = |kind, message: String| MigrationFailure {
            path: path.to_path_buf(),
            kind,
            message,
        };

        let dir = path.parent().unwrap_or(self.tree.root());
        let scope = self
            .tree
            .checked_dir(dir)
            .map_err(|e| failure(MigrationErrorKind::Path, e.to_string()))?;

        let bytes = fs::read(path).map_err(|e| failure(MigrationErrorKind::Io, e.to_string()))?;
        let digest = hex::encode(Sha256::digest(&bytes));

        let legacy = parse_legacy(&bytes).map_err(|e| {
            let kind = match e {
                LegacyError::Settings(_) => MigrationErrorKind::Settings,
                LegacyError::Json(_) | LegacyError::NotAnObject => MigrationErrorKind::Parse,
            };
            failure(kind, e.to_string())
        })?;
        for key in &legacy.ignored {
            tracing::warn!(path = %path.display(), key = %key, "unknown legacy key ignored");
        }

        let keys: Vec<SettingKey> = legacy.record.keys().collect();
        if !keys.is_empty() {
            let mut record = self
                .store
                .get(&scope)
                .map_err(|e| failure(MigrationErrorKind::Io, e.to_string()))?
                .unwrap_or_default();
            record.merge_from(&legacy.record);
            record.touch();
            self.store
                .put(&scope, record)
                .map_err(|e| failure(MigrationErrorKind::Io, e.to_string()))?;
        }

        tracing::debug!(path = %path.display(), %scope, keys = keys.len(), "legacy settings migrated");
        Ok(MigratedFile {
            path: path.to_path_buf(),
            scope,
            digest,
            keys,
            ignored: legacy.ignored,
        })
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}
