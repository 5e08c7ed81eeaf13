//! Derived line-count cache
//!
//! Memoizes per-file [`FileStats`](linelens_scanner::FileStats) and their
//! threshold classification:
//! - entries are keyed by path and validated against a fingerprint
//!   (modification time + size) so out-of-band edits are noticed
//! - a save forces a rescan
//! - a configuration change reclassifies cached counts without rescanning
//! - closing a document evicts its entry; a size bound caps the rest

mod derived;
mod fingerprint;

pub use derived::{CacheConfig, CacheStats, CachedStats, DerivedValueCache};
pub use fingerprint::Fingerprint;

use std::path::PathBuf;

use linelens_scanner::ScanError;
use thiserror::Error;

/// Cache result type
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
