//! hypergen CLI library
//!
//! Command implementations live here so they can be exercised from tests
//! without spawning the binary.

pub mod commands;

pub use commands::{CacheCommand, ListCommand, ResolveCommand, WhichCommand};

use hypergen::namespace::ConflictStrategy;

/// Conflict strategy accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    /// Abort when two roots define the same action (default)
    Fail,
    /// Keep the definition from the first root
    Skip,
    /// Keep the definition from the last root
    Override,
}

impl From<StrategyArg> for ConflictStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Fail => Self::Fail,
            StrategyArg::Skip => Self::Skip,
            StrategyArg::Override => Self::Override,
        }
    }
}
