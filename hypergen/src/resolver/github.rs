//! GitHub repository template resolver
//!
//! Templates are fetched from the raw-content host as
//! `<raw base>/<owner>/<repo>/<ref>/<path>/template.yml` and staged in a
//! per-`owner-repo-ref` scratch directory so callers get a usable base path.

use super::{
    ResolutionErrorKind, ResolveResult, ResolvedTemplate, TemplateUrlResolver, UrlResolutionError,
    UrlType, TEMPLATE_FILES,
};
use crate::config::{HypergenConfig, SecuritySettings};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{AUTHORIZATION, ETAG};
use reqwest::StatusCode;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Raw content host used for fetches
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

const GITHUB_DOMAIN: &str = "github.com";
const SHORTHAND: &str = "github:";
const DEFAULT_REF: &str = "main";

/// A template location inside a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubLocation {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch, tag or commit
    pub git_ref: String,
    /// Directory inside the repository, without leading or trailing slashes
    pub path: String,
}

impl GitHubLocation {
    /// Parse any supported GitHub URL form
    ///
    /// - `github:owner/repo[@ref][/path]` (ref defaults to `main`)
    /// - `https://github.com/owner/repo[/tree/<ref>/<path>]`
    /// - `https://raw.githubusercontent.com/owner/repo/<ref>/<path>`
    ///
    /// A trailing `template.yml`/`template.yaml` segment is dropped from the path.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the URL is malformed.
    pub fn parse(url: &str) -> Result<Self, String> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix(SHORTHAND) {
            return Self::parse_shorthand(rest);
        }

        let without_scheme = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| "expected `github:` shorthand or an http(s) URL".to_string())?;
        let (host, rest) = without_scheme.split_once('/').unwrap_or((without_scheme, ""));
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

        match host {
            "raw.githubusercontent.com" => match segments.as_slice() {
                [owner, repo, git_ref, path @ ..] => Self::build(owner, repo, git_ref, path),
                _ => Err("expected raw.githubusercontent.com/<owner>/<repo>/<ref>[/<path>]".to_string()),
            },
            "github.com" | "www.github.com" => match segments.as_slice() {
                [owner, repo] => Self::build(owner, repo, DEFAULT_REF, &[]),
                [owner, repo, "tree" | "blob", git_ref, path @ ..] => Self::build(owner, repo, git_ref, path),
                _ => Err("expected github.com/<owner>/<repo>/tree/<ref>[/<path>]".to_string()),
            },
            other => Err(format!("`{other}` is not a GitHub host")),
        }
    }

    fn parse_shorthand(rest: &str) -> Result<Self, String> {
        let (owner, rest) = rest
            .split_once('/')
            .ok_or_else(|| "expected github:<owner>/<repo>[@ref][/path]".to_string())?;
        let (repo_and_ref, path) = rest.split_once('/').unwrap_or((rest, ""));
        let (repo, git_ref) = repo_and_ref.split_once('@').unwrap_or((repo_and_ref, DEFAULT_REF));
        if owner.is_empty() || repo.is_empty() || git_ref.is_empty() {
            return Err("owner, repository and ref must not be empty".to_string());
        }
        let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        Self::build(owner, repo, git_ref, &path)
    }

    fn build(owner: &str, repo: &str, git_ref: &str, path: &[&str]) -> Result<Self, String> {
        let repo = repo.trim_end_matches(".git");
        for segment in [owner, repo, git_ref].iter().chain(path) {
            check_segment(segment)?;
        }

        let mut path = path.to_vec();
        if path.last().is_some_and(|last| TEMPLATE_FILES.contains(last)) {
            path.pop();
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            path: path.join("/"),
        })
    }

    /// URL of `template.yml` under `raw_base`
    #[must_use]
    pub fn fetch_url(&self, raw_base: &str) -> String {
        let mut url = format!(
            "{}/{}/{}/{}",
            raw_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.git_ref
        );
        if !self.path.is_empty() {
            url.push('/');
            url.push_str(&self.path);
        }
        url.push('/');
        url.push_str(TEMPLATE_FILES[0]);
        url
    }

    /// Scratch directory name for this repository and ref
    #[must_use]
    pub fn scratch_name(&self) -> String {
        format!("{}-{}-{}", self.owner, self.repo, self.git_ref).replace(['/', '\\'], "-")
    }
}

fn check_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("owner, repository and ref must not be empty".to_string());
    }
    if matches!(segment, "." | "..") || segment.contains('\\') {
        return Err(format!("`{segment}` is not allowed in a repository path"));
    }
    Ok(())
}

/// Resolves templates hosted in GitHub repositories
#[derive(Debug, Clone)]
pub struct GitHubResolver {
    client: reqwest::Client,
    security: SecuritySettings,
    timeout: Duration,
    token: Option<String>,
    raw_base: String,
    scratch_dir: PathBuf,
}

impl GitHubResolver {
    /// Create a resolver with the given security policy and request timeout
    #[must_use]
    pub fn new(security: SecuritySettings, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hypergen/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            security,
            timeout,
            token: None,
            raw_base: DEFAULT_RAW_BASE.to_string(),
            scratch_dir: std::env::temp_dir().join("hypergen-github"),
        }
    }

    /// Create a resolver from configuration
    ///
    /// The access token is read from the configured environment variable only
    /// when private repositories are allowed.
    #[must_use]
    pub fn from_config(config: &HypergenConfig) -> Self {
        let token = config
            .security
            .allow_private_repos
            .then(|| std::env::var(&config.resolver.github_token_env).ok())
            .flatten()
            .filter(|t| !t.trim().is_empty());
        Self::new(config.security.clone(), config.resolver.timeout()).with_token(token)
    }

    /// Set the bearer token sent with every fetch
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Fetch from a different raw-content host
    #[must_use]
    pub fn with_raw_base(mut self, raw_base: impl Into<String>) -> Self {
        self.raw_base = raw_base.into();
        self
    }

    /// Stage fetched templates under `dir`
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Directory a location is staged in
    ///
    /// Returns `None` if the location would leave the scratch directory.
    #[must_use]
    pub fn staging_path(&self, location: &GitHubLocation) -> Option<PathBuf> {
        let mut relative = PathBuf::from(location.scratch_name());
        if !location.path.is_empty() {
            relative.push(&location.path);
        }
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| self.scratch_dir.join(relative))
    }

    fn error(url: &str, kind: ResolutionErrorKind) -> UrlResolutionError {
        UrlResolutionError::new(url, UrlType::Github, kind)
    }

    fn check_policy(&self, url: &str, fetch_url: &str) -> ResolveResult<()> {
        if let Some(allowed) = &self.security.allowed_domains {
            if !allowed.iter().any(|d| d.eq_ignore_ascii_case(GITHUB_DOMAIN)) {
                return Err(Self::error(
                    url,
                    ResolutionErrorKind::Forbidden(format!("{GITHUB_DOMAIN} is not in the allowed domains")),
                ));
            }
        }
        if self
            .security
            .blocked_domains
            .iter()
            .any(|d| d.eq_ignore_ascii_case(GITHUB_DOMAIN))
        {
            return Err(Self::error(
                url,
                ResolutionErrorKind::Forbidden(format!("{GITHUB_DOMAIN} is blocked")),
            ));
        }
        if self.security.require_https && !fetch_url.starts_with("https://") {
            return Err(Self::error(
                url,
                ResolutionErrorKind::Forbidden(format!("{fetch_url} is not an HTTPS URL")),
            ));
        }
        Ok(())
    }

    fn transport(url: &str, err: reqwest::Error) -> UrlResolutionError {
        let kind = if err.is_timeout() {
            ResolutionErrorKind::Timeout
        } else {
            ResolutionErrorKind::Transport
        };
        Self::error(url, kind).with_source(err)
    }

    async fn fetch(&self, url: &str, fetch_url: &str) -> ResolveResult<(String, Option<String>)> {
        let limit = self.security.max_file_size;
        let mut request = self.client.get(fetch_url).timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await.map_err(|e| Self::transport(url, e))?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Self::error(url, ResolutionErrorKind::NotFound)
                    .with_source(format!("{fetch_url} returned 404")));
            }
            status if !status.is_success() => {
                return Err(Self::error(url, ResolutionErrorKind::Status(status.as_u16())));
            }
            _ => {}
        }

        if let Some(announced) = response.content_length().filter(|len| *len > limit) {
            return Err(Self::error(
                url,
                ResolutionErrorKind::PayloadTooLarge { limit, actual: announced },
            ));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::transport(url, e))?;
            let received = (body.len() + chunk.len()) as u64;
            if received > limit {
                // Dropping the stream closes the connection; the partial body goes with it
                return Err(Self::error(
                    url,
                    ResolutionErrorKind::PayloadTooLarge { limit, actual: received },
                ));
            }
            body.extend_from_slice(&chunk);
        }

        let content = String::from_utf8(body)
            .map_err(|e| Self::error(url, ResolutionErrorKind::Transport).with_source(e))?;
        Ok((content, etag))
    }

    async fn stage(&self, url: &str, dir: &Path, content: &str) -> ResolveResult<()> {
        let io = |e: std::io::Error| Self::error(url, ResolutionErrorKind::Io).with_source(e);
        tokio::fs::create_dir_all(dir).await.map_err(io)?;
        tokio::fs::write(dir.join(TEMPLATE_FILES[0]), content)
            .await
            .map_err(io)
    }
}

#[async_trait]
impl TemplateUrlResolver for GitHubResolver {
    fn supports(&self, url: &str) -> bool {
        UrlType::classify(url) == UrlType::Github && GitHubLocation::parse(url).is_ok()
    }

    async fn resolve(&self, url: &str, _base_path: Option<&Path>) -> ResolveResult<ResolvedTemplate> {
        if UrlType::classify(url) != UrlType::Github {
            return Err(Self::error(url, ResolutionErrorKind::Unsupported));
        }
        let location = GitHubLocation::parse(url)
            .map_err(|reason| Self::error(url, ResolutionErrorKind::InvalidUrl(reason)))?;
        let base_path = self.staging_path(&location).ok_or_else(|| {
            Self::error(
                url,
                ResolutionErrorKind::InvalidUrl("location escapes the staging directory".to_string()),
            )
        })?;
        let fetch_url = location.fetch_url(&self.raw_base);
        self.check_policy(url, &fetch_url)?;

        debug!(url, %fetch_url, "fetching GitHub template");
        let (content, etag) = self.fetch(url, &fetch_url).await.inspect_err(|e| {
            warn!(url, %fetch_url, error = %e, "GitHub fetch failed");
        })?;

        self.stage(url, &base_path, &content).await?;

        Ok(ResolvedTemplate::new(
            content,
            base_path,
            url,
            UrlType::Github,
            Some(location.git_ref),
            etag,
        ))
    }
}
