//! hypergen: template resolution, namespacing and caching for a code generator
//!
//! This crate is the engine behind the `hypergen` CLI. It answers two questions:
//! - **Which files implement `generator:action`?** The [`namespace`] loader walks
//!   ordered template roots into indexed [`store`]s, arbitrating duplicate
//!   definitions with a [`ConflictStrategy`](namespace::ConflictStrategy).
//! - **What is the template behind this URL?** The [`manager`] classifies a URL,
//!   hands it to a [`resolver`] (local path, GitHub repository or a custom one)
//!   and keeps the result in an integrity-checked on-disk [`cache`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hypergen::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HypergenConfig::load()?;
//!
//!     let namespace = NamespaceLoader::from_config(&config.templates).load()?;
//!     if let Some(action) = namespace.action("component", "new") {
//!         println!("component:new lives at {}", action.path.display());
//!     }
//!
//!     let manager = TemplateUrlManager::new(config);
//!     let template = manager.resolve_url("github:acme/widgets@v2/forms", None).await?;
//!     println!("{}", template.content);
//!     Ok(())
//! }
//! ```

// Lint configuration is handled at the workspace level in Cargo.toml

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod namespace;
pub mod observability;
pub mod resolver;
pub mod store;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! ```rust
    //! use hypergen::prelude::*;
    //! ```

    pub use crate::cache::{CacheInfo, CacheValidation, UrlCache};
    pub use crate::config::HypergenConfig;
    pub use crate::error::{HypergenError, Result};
    pub use crate::manager::TemplateUrlManager;
    pub use crate::namespace::{
        Action, ActionStore, ConflictStrategy, Generator, GeneratorStore, Namespace, NamespaceLoader,
    };
    pub use crate::resolver::{ResolvedTemplate, TemplateUrlResolver, UrlResolutionError, UrlType};
    pub use crate::store::{IndexedStore, KeyFormat, Lookup};
}
