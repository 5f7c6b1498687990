//! Template root discovery and conflict arbitration

use super::error::{LoadError, LoadResult};
use super::manifest::{GeneratorManifest, MANIFEST_FILE};
use super::{Action, ActionStore, Generator, GeneratorStore, Namespace};
use crate::config::TemplateSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions stripped from action file names
const SOURCE_EXTENSIONS: &[&str] = &["js", "cjs", "mjs", "ts", "cts", "mts"];

/// What to do when two template roots define the same `generator::action`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    /// Abort loading with [`LoadError::ActionConflict`]
    #[default]
    Fail,
    /// Keep the first-registered definition
    Skip,
    /// Replace the existing definition with the later one
    Override,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Override => "override",
        })
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            "override" => Ok(Self::Override),
            other => Err(format!(
                "unknown conflict strategy `{other}` (expected fail, skip or override)"
            )),
        }
    }
}

/// A directory containing generator directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRoot {
    /// Root directory
    pub path: PathBuf,
}

impl From<PathBuf> for TemplateRoot {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

impl From<&Path> for TemplateRoot {
    fn from(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }
}

impl From<&str> for TemplateRoot {
    fn from(path: &str) -> Self {
        Self { path: PathBuf::from(path) }
    }
}

/// Walks template roots in order and builds a [`Namespace`]
///
/// Roots are processed in the order given; generator and action directories
/// are visited in file-name order, so the outcome of conflict arbitration is
/// deterministic for a given filesystem state.
#[derive(Debug, Clone)]
pub struct NamespaceLoader {
    roots: Vec<TemplateRoot>,
    strategy: ConflictStrategy,
}

impl NamespaceLoader {
    /// Create a loader over ordered template roots
    pub fn new<I, R>(roots: I, strategy: ConflictStrategy) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<TemplateRoot>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            strategy,
        }
    }

    /// Create a loader from the `[templates]` configuration section
    #[must_use]
    pub fn from_config(settings: &TemplateSettings) -> Self {
        Self::new(settings.roots.iter().cloned(), settings.conflict_strategy)
    }

    /// Configured roots, in processing order
    #[must_use]
    pub fn roots(&self) -> &[TemplateRoot] {
        &self.roots
    }

    /// Configured conflict strategy
    #[must_use]
    pub const fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    /// Walk every root and build the namespace
    ///
    /// Nothing is indexed until every root has been walked, so a conflict under
    /// [`ConflictStrategy::Fail`] leaves no partially built stores behind.
    ///
    /// # Errors
    ///
    /// - [`LoadError::ActionConflict`] for a conflict under [`ConflictStrategy::Fail`]
    /// - [`LoadError::NotADirectory`] if a root exists but is a file
    /// - [`LoadError::Walk`], [`LoadError::Io`] or [`LoadError::Manifest`] for unreadable
    ///   directories or invalid manifests
    pub fn load(&self) -> LoadResult<Namespace> {
        let mut staged: Vec<Action> = Vec::new();
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut generator_dirs: Vec<(String, PathBuf)> = Vec::new();

        for root in &self.roots {
            if !root.path.exists() {
                warn!(root = %root.path.display(), "template root does not exist, skipping");
                continue;
            }
            if !root.path.is_dir() {
                return Err(LoadError::NotADirectory(root.path.clone()));
            }

            for (generator_name, generator_dir) in child_entries(&root.path, true)? {
                if !generator_dirs.iter().any(|(name, _)| *name == generator_name) {
                    generator_dirs.push((generator_name.clone(), generator_dir.clone()));
                }

                for action in discover_actions(&generator_name, &generator_dir)? {
                    self.stage(&mut staged, &mut slots, action)?;
                }
            }
        }

        let mut actions = ActionStore::for_actions();
        for action in staged {
            actions.add(action)?;
        }

        let mut generators = GeneratorStore::for_generators();
        for (name, path) in generator_dirs {
            let mut names: Vec<String> = actions
                .find_by("generator", &name)?
                .iter()
                .map(|a| a.name.clone())
                .collect();
            names.sort();
            generators.add(Generator { name, path, actions: names })?;
        }

        info!(
            roots = self.roots.len(),
            generators = generators.len(),
            actions = actions.len(),
            strategy = %self.strategy,
            "loaded template namespace"
        );
        Ok(Namespace::new(generators, actions))
    }

    fn stage(
        &self,
        staged: &mut Vec<Action>,
        slots: &mut HashMap<String, usize>,
        action: Action,
    ) -> LoadResult<()> {
        let key = action.key();
        let Some(&slot) = slots.get(&key) else {
            slots.insert(key, staged.len());
            staged.push(action);
            return Ok(());
        };

        let existing = &staged[slot];
        if existing.generator_path == action.generator_path {
            // Same generator directory seen again (e.g. a root listed twice)
            return Ok(());
        }

        match self.strategy {
            ConflictStrategy::Fail => Err(LoadError::ActionConflict {
                key,
                existing: existing.path.clone(),
                incoming: action.path,
            }),
            ConflictStrategy::Skip => {
                debug!(%key, kept = %existing.path.display(), skipped = %action.path.display(), "action conflict, keeping first");
                Ok(())
            }
            ConflictStrategy::Override => {
                debug!(%key, replaced = %existing.path.display(), with = %action.path.display(), "action conflict, overriding");
                staged[slot] = action;
                Ok(())
            }
        }
    }
}

/// Immediate, non-hidden children of `dir` in file-name order
fn child_entries(dir: &Path, dirs_only: bool) -> LoadResult<Vec<(String, PathBuf)>> {
    let mut children = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str() else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 template entry");
            continue;
        };
        if name.starts_with('.') || (dirs_only && !entry.file_type().is_dir()) {
            continue;
        }
        children.push((name.to_string(), entry.into_path()));
    }
    Ok(children)
}

/// Action identifier for a generator entry, or `None` if the entry is not an action
fn action_name(name: &str, path: &Path) -> Option<String> {
    if name == MANIFEST_FILE {
        return None;
    }
    if path.is_dir() {
        return Some(name.to_string());
    }
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && SOURCE_EXTENSIONS.contains(&ext)).then(|| stem.to_string())
}

fn discover_actions(generator_name: &str, generator_dir: &Path) -> LoadResult<Vec<Action>> {
    let entries = child_entries(generator_dir, false)?;
    let action = |name: String, path: PathBuf| Action {
        name,
        path,
        generator_name: generator_name.to_string(),
        generator_path: generator_dir.to_path_buf(),
    };

    if let Some(manifest) = GeneratorManifest::read(generator_dir)? {
        return manifest
            .actions
            .into_iter()
            .map(|declared| {
                entries
                    .iter()
                    .find(|(name, path)| action_name(name, path).as_deref() == Some(declared.as_str()))
                    .map(|(_, path)| action(declared.clone(), path.clone()))
                    .ok_or_else(|| LoadError::Manifest {
                        path: GeneratorManifest::path_in(generator_dir),
                        message: format!("declared action `{declared}` does not exist"),
                    })
            })
            .collect();
    }

    let mut actions: Vec<Action> = Vec::new();
    for (name, path) in entries {
        let Some(name) = action_name(&name, &path) else {
            continue;
        };
        // `new/` and `new.js` map to the same action; the first in file-name order wins
        if actions.iter().any(|a| a.name == name) {
            continue;
        }
        actions.push(action(name, path));
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("SKIP".parse::<ConflictStrategy>().unwrap(), ConflictStrategy::Skip);
        assert_eq!(ConflictStrategy::Override.to_string(), "override");
        assert!("merge".parse::<ConflictStrategy>().is_err());
        assert_eq!(ConflictStrategy::default(), ConflictStrategy::Fail);
    }

    #[test]
    fn test_action_name_strips_source_extensions() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("new.ts");
        touch(&file);

        assert_eq!(action_name("new.ts", &file).as_deref(), Some("new"));
        assert_eq!(action_name("README.md", &dir.path().join("README.md")), None);
        assert_eq!(action_name(".js", &dir.path().join(".js")), None);
        assert_eq!(action_name(MANIFEST_FILE, &dir.path().join(MANIFEST_FILE)), None);
        assert_eq!(action_name("sub", dir.path()).as_deref(), Some("sub"));
    }

    #[test]
    fn test_discovers_directories_and_source_files() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("init/new")).unwrap();
        touch(&root.path().join("init/repo.js"));
        touch(&root.path().join("init/notes.md"));
        touch(&root.path().join("init/.hidden.js"));

        let namespace = NamespaceLoader::new([root.path()], ConflictStrategy::Fail).load().unwrap();

        let generator = namespace.generator("init").unwrap();
        assert_eq!(generator.actions, vec!["new", "repo"]);
        assert_eq!(namespace.action("init", "repo").unwrap().path, root.path().join("init/repo.js"));
    }

    #[test]
    fn test_manifest_limits_registered_actions() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("init/new")).unwrap();
        fs::create_dir_all(root.path().join("init/scratch")).unwrap();
        fs::write(root.path().join("init").join(MANIFEST_FILE), "actions = [\"new\"]").unwrap();

        let namespace = NamespaceLoader::new([root.path()], ConflictStrategy::Fail).load().unwrap();
        assert!(namespace.action("init", "new").is_some());
        assert!(namespace.action("init", "scratch").is_none());
    }

    #[test]
    fn test_manifest_with_missing_action_fails() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("init")).unwrap();
        fs::write(root.path().join("init").join(MANIFEST_FILE), "actions = [\"ghost\"]").unwrap();

        let err = NamespaceLoader::new([root.path()], ConflictStrategy::Fail).load().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("init/new")).unwrap();
        let missing = root.path().join("nope");

        let namespace = NamespaceLoader::new([missing.as_path(), root.path()], ConflictStrategy::Fail)
            .load()
            .unwrap();
        assert_eq!(namespace.actions().len(), 1);
    }

    #[test]
    fn test_file_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("root.txt");
        touch(&file);

        let err = NamespaceLoader::new([file.as_path()], ConflictStrategy::Fail).load().unwrap_err();
        assert!(matches!(err, LoadError::NotADirectory(_)));
    }

    #[test]
    fn test_from_config_keeps_root_order() {
        let settings = TemplateSettings {
            roots: vec![PathBuf::from("a"), PathBuf::from("b")],
            conflict_strategy: ConflictStrategy::Override,
        };
        let loader = NamespaceLoader::from_config(&settings);
        assert_eq!(loader.roots()[1].path, PathBuf::from("b"));
        assert_eq!(loader.strategy(), ConflictStrategy::Override);
    }

    #[test]
    fn test_same_root_twice_is_not_a_conflict() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("init/new")).unwrap();

        let namespace = NamespaceLoader::new([root.path(), root.path()], ConflictStrategy::Fail)
            .load()
            .unwrap();
        assert_eq!(namespace.actions().len(), 1);
    }
}
