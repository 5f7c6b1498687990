//! Filesystem template resolver

use super::{
    ResolutionErrorKind, ResolveResult, ResolvedTemplate, TemplateUrlResolver, UrlResolutionError,
    UrlType, TEMPLATE_FILES,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const FILE_SCHEME: &str = "file://";

/// Resolves plain paths and `file://` URIs
///
/// A path may name a `template.yml`/`template.yaml` directly or a directory
/// containing one. Relative paths are resolved against the base path passed to
/// [`resolve`](TemplateUrlResolver::resolve), or the working directory.
#[derive(Debug, Clone, Default)]
pub struct LocalResolver;

impl LocalResolver {
    /// Create a local resolver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn absolute(url: &str, path: &str, base_path: Option<&Path>) -> ResolveResult<PathBuf> {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return Ok(path);
        }
        match base_path {
            Some(base) => Ok(base.join(path)),
            None => std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .map_err(|e| {
                    UrlResolutionError::new(url, UrlType::Local, ResolutionErrorKind::Io).with_source(e)
                }),
        }
    }

    async fn locate(path: &Path) -> Option<PathBuf> {
        let names_config = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| TEMPLATE_FILES.contains(&n));
        if names_config {
            return fs::metadata(path)
                .await
                .is_ok_and(|m| m.is_file())
                .then(|| path.to_path_buf());
        }

        for name in TEMPLATE_FILES {
            let candidate = path.join(name);
            if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl TemplateUrlResolver for LocalResolver {
    fn supports(&self, url: &str) -> bool {
        url.starts_with(FILE_SCHEME) || is_windows_drive(url) || !url.contains(':')
    }

    async fn resolve(&self, url: &str, base_path: Option<&Path>) -> ResolveResult<ResolvedTemplate> {
        if !self.supports(url) {
            return Err(UrlResolutionError::new(url, UrlType::Local, ResolutionErrorKind::Unsupported));
        }

        let raw = url.strip_prefix(FILE_SCHEME).unwrap_or(url);
        let path = Self::absolute(url, raw, base_path)?;
        let Some(config) = Self::locate(&path).await else {
            return Err(
                UrlResolutionError::new(url, UrlType::Local, ResolutionErrorKind::NotFound).with_source(
                    format!("no {} in {}", TEMPLATE_FILES.join(" or "), path.display()),
                ),
            );
        };

        let content = fs::read_to_string(&config).await.map_err(|e| {
            UrlResolutionError::new(url, UrlType::Local, ResolutionErrorKind::Io).with_source(e)
        })?;
        let base = config.parent().map_or_else(|| path.clone(), Path::to_path_buf);
        debug!(url, config = %config.display(), "resolved local template");

        Ok(ResolvedTemplate::new(content, base, url, UrlType::Local, None, None))
    }
}

fn is_windows_drive(url: &str) -> bool {
    let bytes = url.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && matches!(bytes[2], b'\\' | b'/')
}
