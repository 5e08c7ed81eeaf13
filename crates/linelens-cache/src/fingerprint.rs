//! Content-version signal for cached files.

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Cheap stand-in for "has this file changed since we scanned it".
///
/// Out-of-band edits (another editor, `git checkout`) change either the
/// modification time or the size, so comparing both is enough without
/// hashing contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    /// Modification time, if the platform reports one
    pub modified: Option<SystemTime>,
    /// Size in bytes
    pub size_bytes: u64,
}

impl Fingerprint {
    /// Read the fingerprint of a file on disk.
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            modified: metadata.modified().ok(),
            size_bytes: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_fingerprint_changes_with_size() {
        let mut temp = NamedTempFile::new().unwrap();
        write!(temp, "a").unwrap();
        temp.flush().unwrap();
        let first = Fingerprint::of(temp.path()).unwrap();

        write!(temp, "bc").unwrap();
        temp.flush().unwrap();
        let second = Fingerprint::of(temp.path()).unwrap();

        assert_eq!(first.size_bytes, 1);
        assert_eq!(second.size_bytes, 3);
        assert_ne!(first, second);
    }

    #[test]
    fn test_fingerprint_missing_file() {
        assert!(Fingerprint::of(Path::new("/no/such/file")).is_err());
    }
}
