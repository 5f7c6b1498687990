//! Static action declarations for a generator directory

use super::error::{LoadError, LoadResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name looked up inside every generator directory
pub const MANIFEST_FILE: &str = "generator.toml";

/// Contents of a `generator.toml` manifest
///
/// ```toml
/// actions = ["new", "with-prisma"]
/// ```
///
/// When a manifest is present only the listed actions are registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorManifest {
    /// Declared action names
    #[serde(default)]
    pub actions: Vec<String>,
}

impl GeneratorManifest {
    /// Read the manifest of a generator directory, if it has one
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Io`] if the file exists but cannot be read and
    /// [`LoadError::Manifest`] if it is not valid TOML for this schema.
    pub fn read(generator_dir: &Path) -> LoadResult<Option<Self>> {
        let path = Self::path_in(generator_dir);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let manifest: Self = toml::from_str(&raw).map_err(|e| LoadError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if let Some(blank) = manifest.actions.iter().find(|a| a.trim().is_empty() || a.contains('/')) {
            return Err(LoadError::Manifest {
                path,
                message: format!("`{blank}` is not a valid action name"),
            });
        }

        Ok(Some(manifest))
    }

    /// Path of the manifest inside `generator_dir`
    #[must_use]
    pub fn path_in(generator_dir: &Path) -> PathBuf {
        generator_dir.join(MANIFEST_FILE)
    }
}
