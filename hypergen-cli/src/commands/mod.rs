//! CLI command implementations

pub mod cache;
pub mod list;
pub mod resolve;
pub mod which;

pub use cache::CacheCommand;
pub use list::ListCommand;
pub use resolve::ResolveCommand;
pub use which::WhichCommand;

use anyhow::{Context, Result};
use console::Emoji;
use hypergen::config::HypergenConfig;
use hypergen::namespace::{Namespace, NamespaceLoader};

pub(crate) static SUCCESS: Emoji = Emoji("✓", "√");
pub(crate) static FAILURE: Emoji = Emoji("✗", "x");
pub(crate) static INFO: Emoji = Emoji("ℹ", "i");
pub(crate) static WARNING: Emoji = Emoji("⚠", "!");

/// Load the namespace described by the `[templates]` section
pub(crate) fn load_namespace(config: &HypergenConfig) -> Result<Namespace> {
    NamespaceLoader::from_config(&config.templates)
        .load()
        .context("Failed to load template roots")
}

/// Human-readable byte count
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(50 * 1024 * 1024), "50.0 MiB");
    }
}
