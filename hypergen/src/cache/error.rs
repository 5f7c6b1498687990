//! Cache errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by cache writes and administrative scans
///
/// Reads never fail: unreadable, stale or corrupt entries are reported as misses.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem operation failed
    #[error("cache I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Entry metadata could not be serialized
    #[error("failed to serialize cache metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
