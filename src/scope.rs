//! Scope hierarchy
//!
//! Scopes form a chain: `Directory(a/b)` → `Directory(a)` → `Root` → `Global`.
//! Parents are computed from the path structure; nothing about the tree is
//! stored. Directory scopes are identified by their path relative to the
//! workspace root, so the same settings survive the workspace moving on disk.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

/// A path was supplied where a workspace-relative directory was required,
/// but it was absolute, escaped the root, or otherwise unsafe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathSecurityError {
    #[error("absolute path where a relative path was required: {0}")]
    Absolute(String),

    #[error("path contains traversal segments: {0}")]
    Traversal(String),

    #[error("path lies outside the workspace root: {}", .0.display())]
    OutsideRoot(PathBuf),

    #[error("empty directory path")]
    Empty,
}

fn drive_letter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]:([\\/]|$)").expect("static regex"))
}

/// Whether `s` starts with a Windows drive letter form such as `C:\` or `c:/`.
pub fn has_drive_prefix(s: &str) -> bool {
    drive_letter().is_match(s)
}

/// Non-empty workspace-relative directory path with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Parse a relative path, rejecting absolute and traversing forms.
    ///
    /// `.` segments and duplicate separators are dropped. Returns `Ok(None)`
    /// when nothing remains, which callers treat as the root itself.
    pub fn parse(raw: &str) -> Result<Option<Self>, PathSecurityError> {
        let unified = raw.trim().replace('\\', "/");
        if unified.starts_with('/') || has_drive_prefix(&unified) {
            return Err(PathSecurityError::Absolute(raw.to_string()));
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathSecurityError::Traversal(raw.to_string())),
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Self(segments.join("/"))))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Enclosing directory, or `None` for a top-level directory.
    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| RelativePath(parent.to_string()))
    }

    /// Number of path segments.
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Absolute location under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = PathSecurityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RelativePath::parse(&value)?.ok_or(PathSecurityError::Empty)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

/// Identity of a node in the inheritance hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeId {
    Global,
    Root,
    Directory(RelativePath),
}

impl ScopeId {
    /// Structural parent; `Global` has none.
    pub fn parent(&self) -> Option<ScopeId> {
        match self {
            ScopeId::Global => None,
            ScopeId::Root => Some(ScopeId::Global),
            ScopeId::Directory(path) => Some(
                path.parent()
                    .map(ScopeId::Directory)
                    .unwrap_or(ScopeId::Root),
            ),
        }
    }

    /// This scope followed by every ancestor, nearest first.
    pub fn chain(&self) -> Vec<ScopeId> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(scope) = current {
            current = scope.parent();
            chain.push(scope);
        }
        chain
    }

    pub fn level(&self) -> ScopeLevel {
        match self {
            ScopeId::Global => ScopeLevel::Global,
            ScopeId::Root => ScopeLevel::Root,
            ScopeId::Directory(_) => ScopeLevel::Directory,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, ScopeId::Global)
    }

    /// Stable key used in persisted documents.
    pub fn storage_key(&self) -> String {
        match self {
            ScopeId::Global => "global".to_string(),
            ScopeId::Root => "root".to_string(),
            ScopeId::Directory(path) => format!("dir:{}", path),
        }
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

impl FromStr for ScopeId {
    type Err = PathSecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(ScopeId::Global),
            "root" => Ok(ScopeId::Root),
            other => {
                let rel = other.strip_prefix("dir:").unwrap_or(other);
                Ok(RelativePath::parse(rel)?
                    .map(ScopeId::Directory)
                    .unwrap_or(ScopeId::Root))
            }
        }
    }
}

impl Serialize for ScopeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.storage_key())
    }
}

impl<'de> Deserialize<'de> for ScopeId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Hierarchy level of a scope, used for UI attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeLevel {
    Global,
    Root,
    Directory,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Source {
    /// Built-in default table
    Default,
    Global,
    Root,
    Directory(RelativePath),
}

impl Source {
    /// Level of the supplying scope; `None` for built-in defaults.
    pub fn level(&self) -> Option<ScopeLevel> {
        match self {
            Source::Default => None,
            Source::Global => Some(ScopeLevel::Global),
            Source::Root => Some(ScopeLevel::Root),
            Source::Directory(_) => Some(ScopeLevel::Directory),
        }
    }

    /// Whether this source is exactly `scope`.
    pub fn is_scope(&self, scope: &ScopeId) -> bool {
        match (self, scope) {
            (Source::Global, ScopeId::Global) | (Source::Root, ScopeId::Root) => true,
            (Source::Directory(a), ScopeId::Directory(b)) => a == b,
            _ => false,
        }
    }
}

impl From<ScopeId> for Source {
    fn from(scope: ScopeId) -> Self {
        match scope {
            ScopeId::Global => Source::Global,
            ScopeId::Root => Source::Root,
            ScopeId::Directory(path) => Source::Directory(path),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Default => f.write_str("default"),
            Source::Global => f.write_str("global"),
            Source::Root => f.write_str("root"),
            Source::Directory(path) => write!(f, "directory {}", path),
        }
    }
}

/// The hierarchy for one workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTree {
    root: PathBuf,
}

impl ScopeTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a workspace-relative directory and return its scope.
    pub fn checked_relative(&self, raw: &str) -> Result<ScopeId, PathSecurityError> {
        Ok(RelativePath::parse(raw)?
            .map(ScopeId::Directory)
            .unwrap_or(ScopeId::Root))
    }

    /// Like [`checked_relative`](Self::checked_relative), but unsafe input
    /// falls back to the root scope instead of failing.
    pub fn scope_for_relative(&self, raw: &str) -> ScopeId {
        self.checked_relative(raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "rejected scope path, using root scope");
            ScopeId::Root
        })
    }

    /// Scope of a directory given as an absolute (or root-joined) path.
    pub fn checked_dir(&self, dir: &Path) -> Result<ScopeId, PathSecurityError> {
        let rel = dir
            .strip_prefix(&self.root)
            .map_err(|_| PathSecurityError::OutsideRoot(dir.to_path_buf()))?;

        let mut segments = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(PathSecurityError::Traversal(rel.display().to_string())),
            }
        }
        self.checked_relative(&segments.join("/"))
    }

    /// Scope of a directory; paths outside the root fall back to the root scope.
    pub fn scope_for_dir(&self, dir: &Path) -> ScopeId {
        self.checked_dir(dir).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "rejected scope path, using root scope");
            ScopeId::Root
        })
    }

    /// Scope governing a file: the directory that contains it.
    pub fn scope_for_file(&self, file: &Path) -> ScopeId {
        match file.parent() {
            Some(dir) => self.scope_for_dir(dir),
            None => ScopeId::Root,
        }
    }

    /// Directory on disk for a scope; `Global` has none.
    pub fn dir_of(&self, scope: &ScopeId) -> Option<PathBuf> {
        match scope {
            ScopeId::Global => None,
            ScopeId::Root => Some(self.root.clone()),
            ScopeId::Directory(path) => Some(path.to_path(&self.root)),
        }
    }
}
