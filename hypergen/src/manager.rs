//! Template URL orchestration
//!
//! [`TemplateUrlManager`] is the single entry point for turning template URLs
//! into content: it consults the [`UrlCache`], classifies the URL, picks a
//! registered [`TemplateUrlResolver`] and stores what the resolver returns.
//!
//! ```rust,no_run
//! use hypergen::config::HypergenConfig;
//! use hypergen::manager::TemplateUrlManager;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manager = TemplateUrlManager::new(HypergenConfig::load()?);
//! let template = manager.resolve_url("github:acme/widgets@v2/forms", None).await?;
//! println!("{} bytes from {}", template.content.len(), template.base_path.display());
//! # Ok(())
//! # }
//! ```

use crate::cache::{CacheInfo, CacheResult, CacheValidation, UrlCache};
use crate::config::{CacheSettings, HypergenConfig, ResolverSettings, SecuritySettings};
use crate::resolver::{
    GitHubResolver, LocalResolver, ResolutionErrorKind, ResolveResult, ResolvedTemplate,
    TemplateUrlResolver, UrlResolutionError, UrlType,
};
use futures_util::future::{join_all, try_join_all};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Partial configuration applied by [`TemplateUrlManager::set_config`]
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    /// Replace the cache settings
    pub cache: Option<CacheSettings>,
    /// Replace the security policy
    pub security: Option<SecuritySettings>,
    /// Replace the resolver settings
    pub resolver: Option<ResolverSettings>,
}

struct Registration {
    url_type: UrlType,
    resolver: Arc<dyn TemplateUrlResolver>,
    builtin: bool,
}

/// Resolves template URLs through a cache and a registry of resolvers
pub struct TemplateUrlManager {
    config: HypergenConfig,
    cache: UrlCache,
    resolvers: Vec<Registration>,
}

impl fmt::Debug for TemplateUrlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateUrlManager")
            .field("cache", &self.cache)
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.url_type).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl TemplateUrlManager {
    /// Create a manager with the built-in local and GitHub resolvers
    #[must_use]
    pub fn new(config: HypergenConfig) -> Self {
        let cache = UrlCache::new(&config.cache);
        let mut manager = Self {
            config,
            cache,
            resolvers: Vec::new(),
        };
        manager.register_builtins();
        manager
    }

    /// Replace the cache, e.g. to inject a clock
    #[must_use]
    pub fn with_cache(mut self, cache: UrlCache) -> Self {
        self.cache = cache;
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &HypergenConfig {
        &self.config
    }

    /// Underlying cache
    #[must_use]
    pub const fn cache(&self) -> &UrlCache {
        &self.cache
    }

    fn register_builtins(&mut self) {
        self.resolvers.retain(|r| !r.builtin);
        let builtins: [(UrlType, Arc<dyn TemplateUrlResolver>); 2] = [
            (UrlType::Local, Arc::new(LocalResolver::new())),
            (UrlType::Github, Arc::new(GitHubResolver::from_config(&self.config))),
        ];
        for (url_type, resolver) in builtins {
            if !self.resolvers.iter().any(|r| r.url_type == url_type) {
                self.resolvers.push(Registration {
                    url_type,
                    resolver,
                    builtin: true,
                });
            }
        }
    }

    /// Register a resolver for a URL type, replacing any existing one for that type
    pub fn add_resolver(&mut self, url_type: UrlType, resolver: Arc<dyn TemplateUrlResolver>) {
        let registration = Registration {
            url_type,
            resolver,
            builtin: false,
        };
        match self.resolvers.iter_mut().find(|r| r.url_type == url_type) {
            Some(slot) => *slot = registration,
            None => self.resolvers.push(registration),
        }
        debug!(%url_type, "registered template resolver");
    }

    /// Apply a partial configuration
    ///
    /// The cache is rebuilt from the resulting settings (hit/miss counters
    /// restart) and keeps the clock of the current cache, including one
    /// injected with [`with_cache`](Self::with_cache). The built-in resolvers
    /// are recreated; resolvers added with [`add_resolver`](Self::add_resolver)
    /// are kept.
    pub fn set_config(&mut self, update: ConfigUpdate) {
        if let Some(cache) = update.cache {
            self.config.cache = cache;
        }
        if let Some(security) = update.security {
            self.config.security = security;
        }
        if let Some(resolver) = update.resolver {
            self.config.resolver = resolver;
        }
        self.cache = self.cache.reconfigured(&self.config.cache);
        self.register_builtins();
    }

    fn select(&self, url: &str, url_type: UrlType) -> Option<&Arc<dyn TemplateUrlResolver>> {
        self.resolvers
            .iter()
            .find(|r| r.url_type == url_type && r.resolver.supports(url))
            .or_else(|| self.resolvers.iter().find(|r| r.resolver.supports(url)))
            .map(|r| &r.resolver)
    }

    /// Resolve one URL, serving from the cache when possible
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionErrorKind::NoResolver`] if no registered resolver
    /// supports the URL, or whatever the chosen resolver fails with. A failure
    /// to write the cache is logged and does not fail the call.
    pub async fn resolve_url(&self, url: &str, base_path: Option<&Path>) -> ResolveResult<ResolvedTemplate> {
        if let Some(hit) = self.cache.get(url).await {
            return Ok(hit);
        }

        let url_type = UrlType::classify(url);
        let resolver = self
            .select(url, url_type)
            .ok_or_else(|| UrlResolutionError::new(url, url_type, ResolutionErrorKind::NoResolver))?;
        debug!(url, %url_type, "resolving template URL");

        let resolved = resolver.resolve(url, base_path).await?;
        if let Err(e) = self.cache.set(url, &resolved).await {
            warn!(url, error = %e, "failed to cache resolved template");
        }
        Ok(resolved)
    }

    /// Resolve several URLs concurrently, failing on the first error
    ///
    /// Results are returned in input order.
    ///
    /// # Errors
    ///
    /// Returns the first resolution error encountered.
    pub async fn resolve_multiple<S: AsRef<str>>(
        &self,
        urls: &[S],
        base_path: Option<&Path>,
    ) -> ResolveResult<Vec<ResolvedTemplate>> {
        try_join_all(urls.iter().map(|url| self.resolve_url(url.as_ref(), base_path))).await
    }

    /// Resolve several URLs concurrently, returning one result per URL in input order
    pub async fn resolve_multiple_settled<S: AsRef<str>>(
        &self,
        urls: &[S],
        base_path: Option<&Path>,
    ) -> Vec<ResolveResult<ResolvedTemplate>> {
        join_all(urls.iter().map(|url| self.resolve_url(url.as_ref(), base_path))).await
    }

    /// Remove every cached template
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be emptied.
    pub async fn clear_cache(&self) -> CacheResult<()> {
        self.cache.clear().await
    }

    /// Cache statistics
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be read.
    pub async fn get_cache_info(&self) -> CacheResult<CacheInfo> {
        self.cache.get_info().await
    }

    /// Scan the cache for corrupt or expired entries
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be read.
    pub async fn validate_cache(&self) -> CacheResult<CacheValidation> {
        self.cache.validate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct PrefixResolver {
        prefix: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    impl PrefixResolver {
        fn new(prefix: &'static str) -> Arc<Self> {
            Arc::new(Self {
                prefix,
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(prefix: &'static str) -> Arc<Self> {
            Arc::new(Self {
                prefix,
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl TemplateUrlResolver for PrefixResolver {
        fn supports(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        async fn resolve(&self, url: &str, _base_path: Option<&Path>) -> ResolveResult<ResolvedTemplate> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UrlResolutionError::new(url, UrlType::Http, ResolutionErrorKind::NotFound));
            }
            Ok(ResolvedTemplate::new(
                format!("from: {url}\n"),
                PathBuf::from("/virtual"),
                url,
                UrlType::Http,
                None,
                None,
            ))
        }
    }

    fn manager(dir: &TempDir) -> TemplateUrlManager {
        let mut config = HypergenConfig::default();
        config.cache.dir = dir.path().join("cache");
        TemplateUrlManager::new(config)
    }

    #[tokio::test]
    async fn test_second_resolution_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let npm = PrefixResolver::new("npm:");
        manager.add_resolver(UrlType::Npm, npm.clone());

        let first = manager.resolve_url("npm:@acme/forms", None).await.unwrap();
        let second = manager.resolve_url("npm:@acme/forms", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(npm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.get_cache_info().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_scheme_has_no_resolver() {
        let dir = TempDir::new().unwrap();
        let err = manager(&dir).resolve_url("npm:@acme/forms", None).await.unwrap_err();

        assert_eq!(err.kind(), &ResolutionErrorKind::NoResolver);
        assert_eq!(err.url_type, UrlType::Npm);
    }

    #[tokio::test]
    async fn test_falls_back_to_probing_every_resolver() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let custom = PrefixResolver::new("vault:");
        manager.add_resolver(UrlType::Http, custom.clone());

        let resolved = manager.resolve_url("vault:forms", None).await.unwrap();
        assert_eq!(resolved.content, "from: vault:forms\n");
        assert_eq!(custom.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolves_local_templates() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("form")).unwrap();
        std::fs::write(dir.path().join("form/template.yml"), "name: form\n").unwrap();

        let resolved = manager(&dir)
            .resolve_url("form", Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(resolved.base_path, dir.path().join("form"));
    }

    #[tokio::test]
    async fn test_local_path_naming_a_github_host_resolves_locally() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("mirror/raw.githubusercontent.com/forms");
        std::fs::create_dir_all(&template).unwrap();
        std::fs::write(template.join("template.yml"), "name: mirrored\n").unwrap();

        let resolved = manager(&dir)
            .resolve_url("mirror/raw.githubusercontent.com/forms", Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(resolved.content, "name: mirrored\n");
        assert_eq!(resolved.metadata.url_type, UrlType::Local);
        assert_eq!(resolved.base_path, template);
    }

    #[tokio::test]
    async fn test_resolve_multiple_preserves_order_and_fails_fast() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.add_resolver(UrlType::Npm, PrefixResolver::new("npm:"));
        manager.add_resolver(UrlType::Http, PrefixResolver::failing("https://"));

        let batch = manager.resolve_multiple(&["npm:b", "npm:a"], None).await.unwrap();
        let contents: Vec<_> = batch.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["from: npm:b\n", "from: npm:a\n"]);

        let err = manager
            .resolve_multiple(&["npm:a", "https://example.com/x"], None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_multiple_settled_keeps_partial_results() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.add_resolver(UrlType::Npm, PrefixResolver::new("npm:"));

        let results = manager
            .resolve_multiple_settled(&["npm:a", "gist:abc", "npm:b"], None)
            .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().unwrap_err().kind(), &ResolutionErrorKind::NoResolver);
        assert!(results[2].is_ok());
    }

    #[tokio::test]
    async fn test_set_config_keeps_custom_resolvers() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        manager.add_resolver(UrlType::Npm, PrefixResolver::new("npm:"));

        let moved = dir.path().join("elsewhere");
        manager.set_config(ConfigUpdate {
            cache: Some(CacheSettings {
                dir: moved.clone(),
                ..CacheSettings::default()
            }),
            ..ConfigUpdate::default()
        });

        assert_eq!(manager.cache().dir(), moved);
        assert!(manager.resolve_url("npm:a", None).await.is_ok());
        assert!(moved.exists());
    }

    #[tokio::test]
    async fn test_set_config_keeps_injected_clock() {
        use crate::cache::MockClock;
        use chrono::{TimeZone, Utc};

        let dir = TempDir::new().unwrap();
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut clock = MockClock::new();
        clock.expect_now().returning(move || fixed);

        let mut config = HypergenConfig::default();
        config.cache.dir = dir.path().join("cache");
        let mut manager = TemplateUrlManager::new(config.clone())
            .with_cache(UrlCache::new(&config.cache).with_clock(Arc::new(clock)));
        manager.add_resolver(UrlType::Npm, PrefixResolver::new("npm:"));

        manager.set_config(ConfigUpdate {
            cache: Some(CacheSettings {
                dir: dir.path().join("moved"),
                ..CacheSettings::default()
            }),
            ..ConfigUpdate::default()
        });
        manager.resolve_url("npm:a", None).await.unwrap();

        let info = manager.get_cache_info().await.unwrap();
        assert_eq!(info.newest_entry, Some(fixed));
    }

    #[tokio::test]
    async fn test_clear_cache_forces_re_resolution() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager(&dir);
        let npm = PrefixResolver::new("npm:");
        manager.add_resolver(UrlType::Npm, npm.clone());

        manager.resolve_url("npm:a", None).await.unwrap();
        manager.clear_cache().await.unwrap();
        manager.resolve_url("npm:a", None).await.unwrap();

        assert_eq!(npm.calls.load(Ordering::SeqCst), 2);
        assert!(manager.validate_cache().await.unwrap().is_valid());
    }
}
