//! Line counting for source files.
//!
//! The [`LineScanner`] trait is the seam between the settings engine and
//! whatever actually reads files. [`BasicScanner`] is a comment-aware
//! implementation good enough for badges; hosts with a richer tokenizer can
//! plug in their own.

mod config;
mod parser;
mod result;

pub use config::{CommentSyntax, ScannerConfig};
pub use parser::{count_lines, LineCounts};
pub use result::{FileStats, Severity, Thresholds};

use std::fs;
use std::path::{Path, PathBuf};

/// Errors produced while scanning a file.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),
}

/// Something that can produce [`FileStats`] for a file or for in-memory text.
pub trait LineScanner {
    /// Scan a file on disk.
    fn scan_file(&self, path: &Path) -> Result<FileStats, ScanError>;

    /// Scan unsaved document text. `path` is only used to pick a syntax.
    fn scan_text(&self, path: &Path, text: &str) -> FileStats;
}

/// Comment-aware scanner driven by a [`ScannerConfig`].
#[derive(Debug, Clone, Default)]
pub struct BasicScanner {
    config: ScannerConfig,
}

impl BasicScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    fn syntax_for(&self, path: &Path) -> Option<&CommentSyntax> {
        self.config
            .syntax_for(path.extension().and_then(|e| e.to_str()))
    }
}

impl LineScanner for BasicScanner {
    fn scan_file(&self, path: &Path) -> Result<FileStats, ScanError> {
        let metadata = fs::metadata(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ScanError::NotAFile(path.to_path_buf()));
        }

        let bytes = fs::read(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        // Binary or mis-encoded files still get a line count
        let text = String::from_utf8_lossy(&bytes);

        let mut stats = self.scan_text(path, &text);
        stats.size_bytes = metadata.len();
        Ok(stats)
    }

    fn scan_text(&self, path: &Path, text: &str) -> FileStats {
        let counts = count_lines(text, self.syntax_for(path));
        FileStats {
            line_count: counts.total,
            code_lines: counts.code,
            comment_lines: counts.comment,
            blank_lines: counts.blank,
            size_bytes: text.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_scan_file() {
        let mut temp = tempfile::Builder::new().suffix(".rs").tempfile().unwrap();
        writeln!(temp, "// comment").unwrap();
        writeln!(temp).unwrap();
        writeln!(temp, "fn main() {{}}").unwrap();

        let stats = BasicScanner::default().scan_file(temp.path()).unwrap();
        assert_eq!(stats.line_count, 3);
        assert_eq!(stats.comment_lines, 1);
        assert_eq!(stats.blank_lines, 1);
        assert_eq!(stats.code_lines, 1);
        assert_eq!(stats.size_bytes, 25);
    }

    #[test]
    fn test_scan_missing_file() {
        let result = BasicScanner::default().scan_file(Path::new("/definitely/not/here.rs"));
        assert!(matches!(result, Err(ScanError::Io { .. })));
    }

    #[test]
    fn test_scan_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = BasicScanner::default().scan_file(dir.path());
        assert!(matches!(result, Err(ScanError::NotAFile(_))));
    }

    #[test]
    fn test_scan_text_uses_extension() {
        let scanner = BasicScanner::default();
        let py = scanner.scan_text(Path::new("a.py"), "# c\nx = 1\n");
        assert_eq!(py.comment_lines, 1);

        let txt = scanner.scan_text(Path::new("a.txt"), "# c\nx = 1\n");
        assert_eq!(txt.comment_lines, 0);
        assert_eq!(txt.code_lines, 2);
    }

    #[test]
    fn test_scan_unknown_extension_file() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "one\ntwo").unwrap();
        let stats = BasicScanner::default().scan_file(temp.path()).unwrap();
        assert_eq!(stats.line_count, 2);
        assert_eq!(stats.code_lines, 2);
    }
}
