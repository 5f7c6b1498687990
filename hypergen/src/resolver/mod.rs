//! Template URL resolution
//!
//! A [`TemplateUrlResolver`] turns an opaque URL into a [`ResolvedTemplate`]:
//! the raw `template.yml` body, a base path for relative lookups, and the
//! metadata the cache needs to verify it later. Built-in resolvers handle
//! local paths ([`LocalResolver`]) and GitHub repositories ([`GitHubResolver`]);
//! further resolvers are registered on the
//! [`TemplateUrlManager`](crate::manager::TemplateUrlManager).

mod error;
mod github;
mod local;

pub use error::{ResolutionErrorKind, UrlResolutionError};
pub use github::{GitHubLocation, GitHubResolver, DEFAULT_RAW_BASE};
pub use local::LocalResolver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Template config file names, in lookup order
pub const TEMPLATE_FILES: [&str; 2] = ["template.yml", "template.yaml"];

/// Result type for URL resolution
pub type ResolveResult<T> = Result<T, UrlResolutionError>;

/// Source category of a template URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlType {
    /// GitHub repository (`github:` shorthand, `github.com`, `raw.githubusercontent.com`)
    Github,
    /// GitHub gist
    Gist,
    /// npm package
    Npm,
    /// Any other HTTP(S) URL
    Http,
    /// Filesystem path or `file://` URI
    Local,
}

impl UrlType {
    /// Classify a URL by prefix and host
    ///
    /// Hosts are only matched after an `http://` or `https://` scheme, so a
    /// relative path that merely mentions a GitHub host stays local.
    #[must_use]
    pub fn classify(url: &str) -> Self {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("gist:") {
            return Self::Gist;
        }
        if lower.starts_with("github:") {
            return Self::Github;
        }
        if lower.starts_with("npm:") {
            return Self::Npm;
        }

        let Some(rest) = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"))
        else {
            return Self::Local;
        };
        match url_host(rest) {
            "gist.github.com" => Self::Gist,
            "github.com" | "www.github.com" | "raw.githubusercontent.com" => Self::Github,
            _ => Self::Http,
        }
    }
}

/// Host of a scheme-less URL remainder, without userinfo or port
fn url_host(rest: &str) -> &str {
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    host.split_once(':').map_or(host, |(host, _)| host)
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Github => "github",
            Self::Gist => "gist",
            Self::Npm => "npm",
            Self::Http => "http",
            Self::Local => "local",
        })
    }
}

/// Provenance of a resolved template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    /// URL as given to the resolver
    pub url: String,
    /// Source category
    #[serde(rename = "type")]
    pub url_type: UrlType,
    /// Git ref or package version, if the source has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// When the content was fetched
    pub last_fetched: DateTime<Utc>,
    /// HTTP entity tag, if the source sent one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Hex SHA-256 of `content`
    pub checksum: String,
}

/// A template body together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTemplate {
    /// Raw `template.yml` content
    pub content: String,
    /// Directory relative template files are resolved against
    pub base_path: PathBuf,
    /// Provenance
    pub metadata: TemplateMetadata,
}

impl ResolvedTemplate {
    /// Build a resolved template, computing the checksum from `content`
    #[must_use]
    pub fn new(
        content: String,
        base_path: PathBuf,
        url: &str,
        url_type: UrlType,
        version: Option<String>,
        etag: Option<String>,
    ) -> Self {
        let checksum = checksum(content.as_bytes());
        Self {
            content,
            base_path,
            metadata: TemplateMetadata {
                url: url.to_string(),
                url_type,
                version,
                last_fetched: Utc::now(),
                etag,
                checksum,
            },
        }
    }
}

/// Hex-encoded SHA-256 of `bytes`
#[must_use]
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A source of templates addressed by URL
///
/// `supports` must be cheap and perform no I/O. `resolve` either returns a
/// complete template or an error; it never returns partial content.
#[async_trait]
pub trait TemplateUrlResolver: Send + Sync {
    /// Whether this resolver understands `url`
    fn supports(&self, url: &str) -> bool;

    /// Fetch and describe the template at `url`
    ///
    /// Relative locations are resolved against `base_path` when given.
    async fn resolve(&self, url: &str, base_path: Option<&Path>) -> ResolveResult<ResolvedTemplate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(UrlType::classify("github:acme/widgets"), UrlType::Github);
        assert_eq!(UrlType::classify("https://github.com/acme/widgets/tree/main/x"), UrlType::Github);
        assert_eq!(
            UrlType::classify("https://raw.githubusercontent.com/acme/widgets/main/x"),
            UrlType::Github
        );
        assert_eq!(UrlType::classify("https://gist.github.com/acme/abc123"), UrlType::Gist);
        assert_eq!(UrlType::classify("gist:abc123"), UrlType::Gist);
        assert_eq!(UrlType::classify("npm:@acme/templates"), UrlType::Npm);
        assert_eq!(UrlType::classify("https://example.com/template.yml"), UrlType::Http);
        assert_eq!(UrlType::classify("./templates/form"), UrlType::Local);
        assert_eq!(UrlType::classify("file:///srv/templates"), UrlType::Local);
        assert_eq!(UrlType::classify("HTTPS://GitHub.com:443/acme/widgets"), UrlType::Github);
        assert_eq!(UrlType::classify("https://example.com/raw.githubusercontent.com/x"), UrlType::Http);
    }

    #[test]
    fn test_paths_mentioning_github_hosts_stay_local() {
        assert_eq!(UrlType::classify("mirror/raw.githubusercontent.com/forms"), UrlType::Local);
        assert_eq!(UrlType::classify("vendor/gist.github.com/abc"), UrlType::Local);
        assert_eq!(UrlType::classify("./github.com/acme/widgets"), UrlType::Local);
    }

    #[test]
    fn test_checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let resolved = ResolvedTemplate::new(
            "name: x".to_string(),
            PathBuf::from("/tmp"),
            "github:a/b",
            UrlType::Github,
            Some("main".to_string()),
            None,
        );
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["basePath"], "/tmp");
        assert_eq!(json["metadata"]["type"], "github");
        assert!(json["metadata"]["lastFetched"].is_string());
        assert!(json["metadata"].get("etag").is_none());
    }
}
