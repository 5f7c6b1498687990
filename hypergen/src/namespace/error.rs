//! Errors raised while loading the generator/action namespace

use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while walking template roots
#[derive(Debug, Error)]
pub enum LoadError {
    /// Two template roots define the same `generator::action` (strategy `fail` only)
    #[error(
        "action `{key}` is defined by more than one template root\n  first:  {}\n  second: {}\n\
         Rename or remove one of them, or set the conflict strategy to `skip` \
         (keep the first) or `override` (keep the last)",
        .existing.display(),
        .incoming.display()
    )]
    ActionConflict {
        /// Composite `generator::action` key
        key: String,
        /// Path of the definition registered first
        existing: PathBuf,
        /// Path of the conflicting definition
        incoming: PathBuf,
    },

    /// A configured template root exists but is not a directory
    #[error("template root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// Directory traversal failed
    #[error("failed to read template directory: {0}")]
    Walk(#[from] walkdir::Error),

    /// Reading a file failed
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A `generator.toml` manifest is malformed or lists a missing action
    #[error("invalid generator manifest {}: {message}", .path.display())]
    Manifest {
        /// Path of the manifest
        path: PathBuf,
        /// What is wrong with it
        message: String,
    },

    /// The staged records could not be indexed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for namespace loading
pub type LoadResult<T> = Result<T, LoadError>;
