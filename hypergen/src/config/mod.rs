//! Configuration management for hypergen
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Environment variables (highest priority, `HYPERGEN_` prefix, `__` for nesting)
//! 2. `./hypergen.toml` (project)
//! 3. `~/.config/hypergen/config.toml` (user config, XDG)
//! 4. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # hypergen.toml
//! [templates]
//! roots = ["_templates", "vendor/templates"]
//! conflict_strategy = "skip"
//!
//! [cache]
//! ttl_ms = 3600000
//! max_size = 10485760
//!
//! [security]
//! blocked_domains = ["example.com"]
//! allow_private_repos = true
//!
//! [resolver]
//! timeout_ms = 10000
//! ```
//!
//! `HYPERGEN_CACHE__TTL_MS=60000` overrides `cache.ttl_ms`.

use crate::namespace::ConflictStrategy;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Project-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "hypergen.toml";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Defaults could not be serialized as the base layer
    #[error("failed to serialize default configuration: {0}")]
    Defaults(#[from] toml::ser::Error),

    /// An explicitly requested configuration file does not exist
    #[error("configuration file {} does not exist", .0.display())]
    Missing(PathBuf),

    /// A source could not be read, parsed or merged
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

/// Template root discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Template roots, processed in order
    pub roots: Vec<PathBuf>,
    /// How duplicate `generator::action` definitions are handled
    pub conflict_strategy: ConflictStrategy,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("_templates")],
            conflict_strategy: ConflictStrategy::Fail,
        }
    }
}

/// On-disk URL cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache directory
    pub dir: PathBuf,
    /// Entry time-to-live in milliseconds
    pub ttl_ms: u64,
    /// Maximum total content size in bytes
    pub max_size: u64,
    /// Verify content checksums on read
    pub integrity_check: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_ms: 24 * 60 * 60 * 1000, // 24 hours
            max_size: 50 * 1024 * 1024,
            integrity_check: true,
        }
    }
}

impl CacheSettings {
    /// Entry time-to-live
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Remote fetch policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// If set, only these domains may be fetched from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    /// Domains that may never be fetched from
    pub blocked_domains: Vec<String>,
    /// Send the configured access token with fetches
    pub allow_private_repos: bool,
    /// Reject non-HTTPS fetch URLs
    pub require_https: bool,
    /// Maximum template size in bytes
    pub max_file_size: u64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            allowed_domains: None,
            blocked_domains: Vec::new(),
            allow_private_repos: false,
            require_https: true,
            max_file_size: 1024 * 1024,
        }
    }
}

/// Resolver request settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Environment variable holding the GitHub access token
    pub github_token_env: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            github_token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl ResolverSettings {
    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Complete hypergen configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypergenConfig {
    /// Template root settings
    #[serde(default)]
    pub templates: TemplateSettings,
    /// URL cache settings
    #[serde(default)]
    pub cache: CacheSettings,
    /// Remote fetch policy
    #[serde(default)]
    pub security: SecuritySettings,
    /// Resolver request settings
    #[serde(default)]
    pub resolver: ResolverSettings,
}

impl HypergenConfig {
    /// Load configuration from the standard locations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Default configuration cannot be serialized to TOML
    /// - A configuration file exists but cannot be read or parsed
    /// - Merged values fail type conversion
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use hypergen::config::HypergenConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = HypergenConfig::load()?;
    /// println!("cache at {}", config.cache.dir.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Self::defaults()?;

        let user_config = Self::user_config_path();
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            figment = figment.merge(Toml::file(&local_config));
        }

        Ok(figment.merge(Self::env()).extract()?)
    }

    /// Load configuration from a specific file instead of the search path
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the defaults cannot be
    /// serialized, or the file does not parse.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Ok(Self::defaults()?
            .merge(Toml::file(path))
            .merge(Self::env())
            .extract()?)
    }

    /// User configuration path (`~/.config/hypergen/config.toml`)
    #[must_use]
    pub fn user_config_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(LOCAL_CONFIG_FILE),
            |dir| dir.join("hypergen").join("config.toml"),
        )
    }

    fn defaults() -> Result<Figment, ConfigError> {
        Ok(Figment::new().merge(Toml::string(&toml::to_string(&Self::default())?)))
    }

    fn env() -> Env {
        Env::prefixed("HYPERGEN_").split("__").lowercase(true)
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(
        || PathBuf::from(".hypergen").join("cache"),
        |dir| dir.join("hypergen").join("templates"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HypergenConfig::default();
        assert_eq!(config.templates.roots, vec![PathBuf::from("_templates")]);
        assert_eq!(config.templates.conflict_strategy, ConflictStrategy::Fail);
        assert_eq!(config.cache.ttl(), Duration::from_secs(86_400));
        assert_eq!(config.cache.max_size, 52_428_800);
        assert!(config.cache.integrity_check);
        assert!(config.security.require_https);
        assert_eq!(config.security.max_file_size, 1_048_576);
        assert_eq!(config.resolver.timeout(), Duration::from_secs(30));
        assert_eq!(config.resolver.github_token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_load_from_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hypergen.toml");
        std::fs::write(
            &path,
            r#"
[templates]
roots = ["a", "b"]
conflict_strategy = "override"

[security]
allowed_domains = ["github.com"]
max_file_size = 2048
"#,
        )
        .unwrap();

        let config = HypergenConfig::load_from(&path).unwrap();
        assert_eq!(config.templates.roots, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(config.templates.conflict_strategy, ConflictStrategy::Override);
        assert_eq!(config.security.allowed_domains, Some(vec!["github.com".to_string()]));
        assert_eq!(config.security.max_file_size, 2048);
        // untouched sections keep their defaults
        assert!(config.security.require_https);
        assert_eq!(config.cache, CacheSettings::default());
    }

    #[test]
    fn test_invalid_strategy_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hypergen.toml");
        std::fs::write(&path, "[templates]\nconflict_strategy = \"merge\"\n").unwrap();

        assert!(HypergenConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = HypergenConfig::load_from(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let rendered = toml::to_string(&HypergenConfig::default()).unwrap();
        let parsed: HypergenConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, HypergenConfig::default());
    }
}
