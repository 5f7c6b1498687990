//! Generator and action namespace
//!
//! Template roots are laid out as `<root>/<generator>/<action>`. The
//! [`NamespaceLoader`] walks an ordered list of roots, arbitrates duplicate
//! `generator::action` definitions with a [`ConflictStrategy`], and produces a
//! [`Namespace`] that owns the resulting [`GeneratorStore`] and [`ActionStore`].
//!
//! ```rust,no_run
//! use hypergen::namespace::{ConflictStrategy, NamespaceLoader};
//!
//! # fn example() -> Result<(), hypergen::namespace::LoadError> {
//! let namespace = NamespaceLoader::new(["_templates", "vendor/templates"], ConflictStrategy::Skip).load()?;
//!
//! if let Some(action) = namespace.action("component", "new") {
//!     println!("component:new -> {}", action.path.display());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod loader;
mod manifest;

pub use error::{LoadError, LoadResult};
pub use loader::{ConflictStrategy, NamespaceLoader, TemplateRoot};
pub use manifest::{GeneratorManifest, MANIFEST_FILE};

use crate::store::{IndexedStore, KeyFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Separator-joined key format used for `generator::action`
pub const ACTION_KEY_FORMAT: KeyFormat = KeyFormat::Joined("::");

/// A named collection of actions sourced from a template root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Generator name (directory name)
    pub name: String,
    /// Generator directory in the root that first introduced it
    pub path: PathBuf,
    /// Names of the actions registered for this generator, sorted
    pub actions: Vec<String>,
}

/// A named, file-backed unit of template content within a generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action name with any source extension stripped
    pub name: String,
    /// File or directory implementing the action
    pub path: PathBuf,
    /// Owning generator name
    pub generator_name: String,
    /// Directory of the generator that defined this action
    pub generator_path: PathBuf,
}

impl Action {
    /// Composite `generator::action` key
    #[must_use]
    pub fn key(&self) -> String {
        ACTION_KEY_FORMAT.compose(&[&self.generator_name, &self.name])
    }
}

/// Generators keyed by name, indexed by `path`
pub type GeneratorStore = IndexedStore<Generator>;

/// Actions keyed by `generator::action`, indexed by `generator`, `generator_path` and `path`
pub type ActionStore = IndexedStore<Action>;

impl IndexedStore<Generator> {
    /// Create an empty generator store
    #[must_use]
    pub fn for_generators() -> Self {
        Self::new("generators", 1, |g: &Generator| vec![g.name.clone()])
            .with_index("path", |g: &Generator| g.path.to_string_lossy().into_owned())
    }
}

impl IndexedStore<Action> {
    /// Create an empty action store
    #[must_use]
    pub fn for_actions() -> Self {
        Self::new("actions", 2, |a: &Action| vec![a.generator_name.clone(), a.name.clone()])
            .with_key_format(ACTION_KEY_FORMAT)
            .with_index("generator", |a: &Action| a.generator_name.clone())
            .with_index("generator_path", |a: &Action| {
                a.generator_path.to_string_lossy().into_owned()
            })
            .with_index("path", |a: &Action| a.path.to_string_lossy().into_owned())
    }

    /// Find an action by generator and action name
    #[must_use]
    pub fn find_action(&self, generator: &str, action: &str) -> Option<Arc<Action>> {
        self.find_by_key(&ACTION_KEY_FORMAT.compose(&[generator, action]))
    }
}

/// The loaded generator/action namespace
///
/// Owned by whoever ran the loader and passed by reference to consumers, so
/// several independent namespaces can coexist in one process.
#[derive(Debug)]
pub struct Namespace {
    generators: GeneratorStore,
    actions: ActionStore,
}

impl Namespace {
    pub(crate) const fn new(generators: GeneratorStore, actions: ActionStore) -> Self {
        Self { generators, actions }
    }

    /// All generators
    #[must_use]
    pub const fn generators(&self) -> &GeneratorStore {
        &self.generators
    }

    /// All actions
    #[must_use]
    pub const fn actions(&self) -> &ActionStore {
        &self.actions
    }

    /// Look up a generator by name
    #[must_use]
    pub fn generator(&self, name: &str) -> Option<Arc<Generator>> {
        self.generators.find_by_key(name)
    }

    /// Look up an action by generator and action name
    #[must_use]
    pub fn action(&self, generator: &str, action: &str) -> Option<Arc<Action>> {
        self.actions.find_action(generator, action)
    }

    /// Actions of one generator, sorted by name
    #[must_use]
    pub fn actions_for(&self, generator: &str) -> Vec<Arc<Action>> {
        let mut actions = self
            .actions
            .find_by("generator", generator)
            .unwrap_or_default();
        actions.sort_by(|a, b| a.name.cmp(&b.name));
        actions
    }

    /// Split into the underlying stores
    #[must_use]
    pub fn into_parts(self) -> (GeneratorStore, ActionStore) {
        (self.generators, self.actions)
    }
}
