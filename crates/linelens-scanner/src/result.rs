//! Scan result and classification types.

use serde::{Deserialize, Serialize};

/// Raw line statistics for one file.
///
/// These counts do not depend on any configuration; only their
/// classification into a [`Severity`] does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Total number of lines.
    pub line_count: u64,

    /// Lines containing code (anything that is neither blank nor comment-only).
    pub code_lines: u64,

    /// Lines containing only comments.
    pub comment_lines: u64,

    /// Lines containing only whitespace.
    pub blank_lines: u64,

    /// File size in bytes.
    pub size_bytes: u64,
}

impl FileStats {
    /// Sum two stats, used for folder totals.
    pub fn combine(&self, other: &FileStats) -> FileStats {
        FileStats {
            line_count: self.line_count + other.line_count,
            code_lines: self.code_lines + other.code_lines,
            comment_lines: self.comment_lines + other.comment_lines,
            blank_lines: self.blank_lines + other.blank_lines,
            size_bytes: self.size_bytes + other.size_bytes,
        }
    }
}

/// Severity tier a line count falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Danger,
}

impl Severity {
    /// All tiers in ascending order.
    pub const ALL: [Severity; 3] = [Severity::Normal, Severity::Warning, Severity::Danger];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

/// Two line-count thresholds separating the severity tiers.
///
/// A count strictly below `mid` is normal, below `high` is warning, and
/// anything at or above `high` is danger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub mid: u64,
    pub high: u64,
}

impl Thresholds {
    pub fn new(mid: u64, high: u64) -> Self {
        Self { mid, high }
    }

    /// Classify a line count.
    ///
    /// If the thresholds are inverted (`mid > high`), `high` wins: counts at
    /// or above `high` are danger even when they are below `mid`.
    pub fn classify(&self, line_count: u64) -> Severity {
        if line_count >= self.high {
            Severity::Danger
        } else if line_count >= self.mid {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { mid: 300, high: 1000 }
    }
}
