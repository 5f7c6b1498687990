//! `hypergen list`

use super::{load_namespace, INFO};
use anyhow::{bail, Result};
use clap::Args;
use console::style;
use hypergen::config::HypergenConfig;
use hypergen::namespace::Namespace;
use std::fmt::Write as _;

/// List generators, or the actions of one generator
#[derive(Debug, Clone, Args)]
pub struct ListCommand {
    /// Only show this generator's actions
    pub generator: Option<String>,
}

impl ListCommand {
    /// Execute the list command
    ///
    /// # Errors
    ///
    /// Returns an error if the template roots cannot be loaded or the requested
    /// generator does not exist.
    pub fn execute(&self, config: &HypergenConfig) -> Result<()> {
        let namespace = load_namespace(config)?;
        print!("{}", self.render(&namespace)?);
        Ok(())
    }

    /// Render the listing for an already loaded namespace
    ///
    /// # Errors
    ///
    /// Returns an error if the requested generator does not exist.
    pub fn render(&self, namespace: &Namespace) -> Result<String> {
        let mut out = String::new();

        if let Some(name) = &self.generator {
            let Some(generator) = namespace.generator(name) else {
                bail!("Generator '{name}' not found");
            };
            let _ = writeln!(out, "{} {}", style(&generator.name).bold(), style(generator.path.display()).dim());
            for action in namespace.actions_for(name) {
                let _ = writeln!(out, "  {:<20} {}", action.name, style(action.path.display()).dim());
            }
            return Ok(out);
        }

        let mut generators = namespace.generators().list_all();
        if generators.is_empty() {
            let _ = writeln!(out, "{INFO} No generators found");
            return Ok(out);
        }
        generators.sort_by(|a, b| a.name.cmp(&b.name));

        for generator in generators {
            let _ = writeln!(
                out,
                "{:<20} {}",
                style(&generator.name).cyan().bold(),
                generator.actions.join(", ")
            );
        }
        Ok(out)
    }
}
