//! Resolution failures

use super::UrlType;
use std::error::Error as StdError;
use std::fmt;

/// Category of a resolution failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionErrorKind {
    /// No template at the location (HTTP 404, missing `template.yml`)
    NotFound,
    /// The resolver was handed a URL it does not understand
    Unsupported,
    /// No registered resolver supports the URL
    NoResolver,
    /// Rejected by the security policy
    Forbidden(String),
    /// The request exceeded its timeout
    Timeout,
    /// Connection or protocol failure
    Transport,
    /// Unexpected HTTP status
    Status(u16),
    /// The body exceeded the configured size limit
    PayloadTooLarge {
        /// Configured maximum, in bytes
        limit: u64,
        /// Bytes announced or received before aborting
        actual: u64,
    },
    /// Local filesystem failure
    Io,
    /// The URL could not be parsed
    InvalidUrl(String),
}

impl fmt::Display for ResolutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("template not found"),
            Self::Unsupported => f.write_str("unsupported URL"),
            Self::NoResolver => f.write_str("no resolver found"),
            Self::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Transport => f.write_str("transport error"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::PayloadTooLarge { limit, actual } => {
                write!(f, "template exceeds size limit ({actual} > {limit} bytes)")
            }
            Self::Io => f.write_str("I/O error"),
            Self::InvalidUrl(reason) => write!(f, "invalid URL: {reason}"),
        }
    }
}

/// A URL could not be turned into a template
#[derive(Debug)]
pub struct UrlResolutionError {
    /// URL being resolved
    pub url: String,
    /// Classified type of `url`
    pub url_type: UrlType,
    kind: ResolutionErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl UrlResolutionError {
    /// Create an error without an underlying cause
    #[must_use]
    pub fn new(url: impl Into<String>, url_type: UrlType, kind: ResolutionErrorKind) -> Self {
        Self {
            url: url.into(),
            url_type,
            kind,
            source: None,
        }
    }

    /// Attach an underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Failure category
    #[must_use]
    pub const fn kind(&self) -> &ResolutionErrorKind {
        &self.kind
    }

    /// Whether this is a "not found" failure
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ResolutionErrorKind::NotFound)
    }
}

impl fmt::Display for UrlResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to resolve {} URL `{}`: {}", self.url_type, self.url, self.kind)?;
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl StdError for UrlResolutionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}
