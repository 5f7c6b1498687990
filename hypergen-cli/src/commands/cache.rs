//! `hypergen cache`

use super::{format_bytes, FAILURE, INFO, SUCCESS, WARNING};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use hypergen::cache::{CacheInfo, CacheValidation};
use hypergen::config::HypergenConfig;
use hypergen::manager::TemplateUrlManager;

/// Template cache commands
#[derive(Debug, Clone, Subcommand)]
pub enum CacheCommand {
    /// Show cache size and hit rate
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every cached template
    Clear,
    /// Check cached entries for corruption and expiry
    Validate,
}

impl CacheCommand {
    /// Execute the cache command
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be read or modified,
    /// or if validation finds corrupt entries.
    pub async fn execute(&self, config: HypergenConfig) -> Result<()> {
        let manager = TemplateUrlManager::new(config);
        self.run(&manager).await
    }

    /// Run against an existing manager
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn run(&self, manager: &TemplateUrlManager) -> Result<()> {
        let dir = manager.cache().dir().display().to_string();
        match self {
            Self::Info { json } => {
                let info = manager.get_cache_info().await.context("Failed to read cache")?;
                if *json {
                    println!("{}", serde_json::to_string_pretty(&info)?);
                } else {
                    print!("{}", render_info(&dir, &info));
                }
            }
            Self::Clear => {
                manager.clear_cache().await.context("Failed to clear cache")?;
                println!("{} Cleared {}", SUCCESS, style(&dir).cyan());
            }
            Self::Validate => {
                let report = manager.validate_cache().await.context("Failed to read cache")?;
                print!("{}", render_validation(&report));
                if !report.is_valid() {
                    bail!("{} corrupt cache entries (run `hypergen cache clear` to reset)", report.errors.len());
                }
            }
        }
        Ok(())
    }
}

/// Human-readable cache statistics
#[must_use]
pub fn render_info(dir: &str, info: &CacheInfo) -> String {
    let timestamp = |t: Option<DateTime<Utc>>| {
        t.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    };
    format!(
        "{INFO} Template cache {}\n  entries:  {}\n  size:     {}\n  oldest:   {}\n  newest:   {}\n  hit rate: {:.1}%\n",
        style(dir).cyan(),
        info.entry_count,
        format_bytes(info.total_size),
        timestamp(info.oldest_entry),
        timestamp(info.newest_entry),
        info.hit_rate * 100.0
    )
}

/// Human-readable validation report
#[must_use]
pub fn render_validation(report: &CacheValidation) -> String {
    let mut out = String::new();
    for error in &report.errors {
        out.push_str(&format!("{FAILURE} {}\n", style(error).red()));
    }
    for warning in &report.warnings {
        out.push_str(&format!("{WARNING} {}\n", style(warning).yellow()));
    }
    if report.errors.is_empty() && report.warnings.is_empty() {
        out.push_str(&format!("{SUCCESS} Cache is consistent\n"));
    }
    out
}
