//! `hypergen which`

use super::load_namespace;
use anyhow::{anyhow, Result};
use clap::Args;
use hypergen::config::HypergenConfig;
use hypergen::namespace::Namespace;
use std::path::PathBuf;

/// Print the path implementing an action
#[derive(Debug, Clone, Args)]
pub struct WhichCommand {
    /// Generator name
    pub generator: String,
    /// Action name
    pub action: String,
}

impl WhichCommand {
    /// Execute the which command
    ///
    /// # Errors
    ///
    /// Returns an error if the template roots cannot be loaded or the action
    /// is not defined.
    pub fn execute(&self, config: &HypergenConfig) -> Result<()> {
        let namespace = load_namespace(config)?;
        println!("{}", self.locate(&namespace)?.display());
        Ok(())
    }

    /// Path of the action in an already loaded namespace
    ///
    /// # Errors
    ///
    /// Returns an error naming the generator's known actions if the action is missing.
    pub fn locate(&self, namespace: &Namespace) -> Result<PathBuf> {
        if let Some(action) = namespace.action(&self.generator, &self.action) {
            return Ok(action.path.clone());
        }

        let known: Vec<String> = namespace
            .actions_for(&self.generator)
            .iter()
            .map(|a| a.name.clone())
            .collect();
        if known.is_empty() {
            Err(anyhow!("Generator '{}' not found", self.generator))
        } else {
            Err(anyhow!(
                "Action '{}' not found in generator '{}' (available: {})",
                self.action,
                self.generator,
                known.join(", ")
            ))
        }
    }
}
