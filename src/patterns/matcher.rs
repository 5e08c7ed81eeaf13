//! Include/exclude matching for workspace-relative paths.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path};

/// Errors for pattern compilation
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("glob pattern error: {0}")]
    GlobError(#[from] globset::Error),
}

/// Compiled include and exclude lists.
///
/// Pattern forms:
/// - `/a/b` or `./a/b` is anchored at the workspace root
/// - `name` or `*.rs` (no `/`) matches at any depth
/// - `a/*.rs` is matched against the full relative path
///
/// Every pattern also matches everything below a matching directory.
/// Patterns pointing outside the workspace (`../`, `~`, drive letters)
/// can never match a workspace path and are skipped.
#[derive(Debug)]
pub struct PatternMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl PatternMatcher {
    /// Compile the include and exclude lists resolved for one scope.
    pub fn from_resolved(include: &[String], exclude: &[String]) -> Result<Self, MatcherError> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    /// Whether a workspace-relative path is excluded.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude.is_match(slash_path(relative))
    }

    /// Whether a workspace-relative path should be counted.
    pub fn is_counted(&self, relative: &Path) -> bool {
        let path = slash_path(relative);
        self.include.is_match(&path) && !self.exclude.is_match(&path)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, MatcherError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand(pattern) {
            let glob = GlobBuilder::new(&expanded).literal_separator(true).build()?;
            builder.add(glob);
        }
    }
    Ok(builder.build()?)
}

fn expand(pattern: &str) -> Vec<String> {
    let pattern = pattern.trim();
    if pattern.is_empty()
        || pattern.starts_with("../")
        || pattern.starts_with('~')
        || crate::scope::has_drive_prefix(pattern)
    {
        if !pattern.is_empty() {
            tracing::debug!(pattern, "pattern points outside the workspace, skipped");
        }
        return Vec::new();
    }

    let base = if let Some(anchored) = pattern.strip_prefix("./") {
        anchored.trim_end_matches('/').to_string()
    } else if let Some(anchored) = pattern.strip_prefix('/') {
        anchored.trim_end_matches('/').to_string()
    } else if !pattern.contains('/') {
        format!("**/{}", pattern)
    } else {
        pattern.trim_end_matches('/').to_string()
    };

    if base.is_empty() || base == "**" {
        return vec!["**".to_string()];
    }
    if let Some(dir) = base.strip_suffix("/**") {
        // `dir/**` also matches `dir` itself so walks can prune it
        if dir.is_empty() || dir == "**" {
            return vec![base];
        }
        return vec![dir.to_string(), base];
    }
    vec![base.clone(), format!("{}/**", base)]
}

fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
