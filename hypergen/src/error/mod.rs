//! Crate-wide error type
//!
//! Each module has its own error enum; [`HypergenError`] wraps them for
//! callers that drive several subsystems and want a single `?`-friendly type.

use thiserror::Error;

/// Any error raised by the hypergen engine
#[derive(Debug, Error)]
pub enum HypergenError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Indexed store misuse
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    /// Template roots could not be loaded
    #[error(transparent)]
    Load(#[from] crate::namespace::LoadError),

    /// A template URL could not be resolved
    #[error(transparent)]
    Resolution(#[from] crate::resolver::UrlResolutionError),

    /// Cache administration failed
    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}

/// Result alias using [`HypergenError`]
pub type Result<T, E = HypergenError> = std::result::Result<T, E>;
