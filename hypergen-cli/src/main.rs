//! hypergen CLI tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hypergen::config::HypergenConfig;
use hypergen::observability::{self, ObservabilityConfig};
use hypergen_cli::{CacheCommand, ListCommand, ResolveCommand, StrategyArg, WhichCommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hypergen")]
#[command(version)]
#[command(about = "Locate, resolve and cache code generator templates", long_about = None)]
struct Cli {
    /// Configuration file (replaces the default search path)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How to handle an action defined in more than one template root
    #[arg(long, global = true, value_enum)]
    strategy: Option<StrategyArg>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List generators, or the actions of one generator
    List(ListCommand),
    /// Print the path implementing an action
    Which(WhichCommand),
    /// Resolve template URLs through the cache
    Resolve(ResolveCommand),
    /// Inspect or manage the template cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    observability::init_with(
        &ObservabilityConfig::new("hypergen")
            .with_verbosity(cli.verbose)
            .with_json(false),
    )?;

    let mut config = match &cli.config {
        Some(path) => HypergenConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HypergenConfig::load().context("Failed to load configuration")?,
    };
    if let Some(strategy) = cli.strategy {
        config.templates.conflict_strategy = strategy.into();
    }

    match cli.command {
        Commands::List(cmd) => cmd.execute(&config),
        Commands::Which(cmd) => cmd.execute(&config),
        Commands::Resolve(cmd) => cmd.execute(config).await,
        Commands::Cache { command } => command.execute(config).await,
    }
}
