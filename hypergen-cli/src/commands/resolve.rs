//! `hypergen resolve`

use super::{format_bytes, FAILURE, SUCCESS};
use anyhow::{bail, Result};
use clap::Args;
use console::style;
use hypergen::config::HypergenConfig;
use hypergen::manager::TemplateUrlManager;
use hypergen::resolver::{ResolveResult, ResolvedTemplate};
use std::path::PathBuf;

/// Resolve template URLs through the cache
#[derive(Debug, Clone, Args)]
pub struct ResolveCommand {
    /// Template URLs (paths, `file://`, `github:owner/repo[@ref][/path]`, GitHub URLs)
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Directory relative paths are resolved against
    #[arg(long, value_name = "DIR")]
    pub base: Option<PathBuf>,

    /// Report every URL instead of stopping at the first failure
    #[arg(long)]
    pub keep_going: bool,

    /// Print the template content after each summary line
    #[arg(long)]
    pub content: bool,

    /// Print results as JSON
    #[arg(long, conflicts_with = "content")]
    pub json: bool,
}

impl ResolveCommand {
    /// Execute the resolve command
    ///
    /// # Errors
    ///
    /// Returns an error if any URL fails to resolve.
    pub async fn execute(&self, config: HypergenConfig) -> Result<()> {
        let manager = TemplateUrlManager::new(config);
        self.run(&manager).await
    }

    /// Resolve with an existing manager
    ///
    /// # Errors
    ///
    /// Returns an error if any URL fails to resolve.
    pub async fn run(&self, manager: &TemplateUrlManager) -> Result<()> {
        let base = self.base.as_deref();

        let results: Vec<ResolveResult<ResolvedTemplate>> = if self.keep_going {
            manager.resolve_multiple_settled(&self.urls, base).await
        } else {
            manager
                .resolve_multiple(&self.urls, base)
                .await?
                .into_iter()
                .map(Ok)
                .collect()
        };

        if self.json {
            let rendered: Vec<_> = results
                .iter()
                .zip(&self.urls)
                .map(|(result, url)| match result {
                    Ok(resolved) => serde_json::to_value(resolved).unwrap_or_default(),
                    Err(e) => serde_json::json!({ "url": url, "error": e.to_string() }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        } else {
            for result in &results {
                self.print(result);
            }
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            bail!("{failed} of {} URLs failed to resolve", results.len());
        }
        Ok(())
    }

    fn print(&self, result: &ResolveResult<ResolvedTemplate>) {
        match result {
            Ok(resolved) => {
                let meta = &resolved.metadata;
                println!(
                    "{} {} {} {}",
                    SUCCESS,
                    style(&meta.url).cyan(),
                    style(resolved.base_path.display()).dim(),
                    style(format!(
                        "({}, {}, sha256 {})",
                        meta.url_type,
                        format_bytes(resolved.content.len() as u64),
                        &meta.checksum[..12.min(meta.checksum.len())]
                    ))
                    .dim()
                );
                if self.content {
                    println!("{}", resolved.content);
                }
            }
            Err(e) => eprintln!("{} {}", FAILURE, style(e).red()),
        }
    }
}
