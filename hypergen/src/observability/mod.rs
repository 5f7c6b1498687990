//! Observability (structured logging)
//!
//! Library code only emits `tracing` events; binaries call [`init`] or
//! [`init_with`] once to install a subscriber writing to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the default configuration
///
/// Sets up:
/// - JSON formatting in release builds, pretty formatting in debug builds
/// - `RUST_LOG`-based filtering, falling back to a build-dependent default
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use hypergen::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("hypergen started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    init_with(&ObservabilityConfig::default())
}

/// Initialize logging with an explicit configuration
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_with(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!(service = %config.service_name, "logging initialized");
    Ok(())
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Extra verbosity on top of the default filter (`-v`, `-vv`)
    pub verbosity: u8,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "hypergen".to_string(),
            verbosity: 0,
            json: !cfg!(debug_assertions),
        }
    }
}

impl ObservabilityConfig {
    /// Create new observability config
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Raise verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Choose JSON or pretty output
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Filter directives used when `RUST_LOG` is unset
    ///
    /// Each `-v` moves one step up from the build's default level.
    #[must_use]
    pub fn default_directives(&self) -> String {
        let base = usize::from(cfg!(debug_assertions));
        let step = (base + usize::from(self.verbosity)).min(DIRECTIVE_LADDER.len() - 1);
        DIRECTIVE_LADDER[step].to_string()
    }
}

const DIRECTIVE_LADDER: [&str; 4] = [
    "warn,hypergen=info",
    "info,hypergen=debug",
    "debug,hypergen=trace",
    "trace",
];
