//! Generic keyed container with declared secondary indices
//!
//! [`IndexedStore`] holds shared items (`Arc<T>`) under a primary key derived from
//! one or more of the item's fields. Additional lookups are only available through
//! indices declared when the store is built, so nobody can mistake a linear scan
//! for an O(1) lookup:
//!
//! ```rust
//! use hypergen::store::{IndexedStore, Lookup};
//!
//! #[derive(Debug, serde::Serialize)]
//! struct Plugin {
//!     vendor: String,
//!     name: String,
//!     license: String,
//! }
//!
//! let mut store = IndexedStore::new("plugins", 2, |p: &Plugin| vec![p.vendor.clone(), p.name.clone()])
//!     .with_index("license", |p: &Plugin| p.license.clone());
//!
//! store.add(Plugin { vendor: "acme".into(), name: "forms".into(), license: "MIT".into() })?;
//!
//! assert!(store.exists(Lookup::Key("acme::forms"))?);
//! assert!(store.exists(Lookup::Parts(&["acme", "forms"]))?);
//! assert_eq!(store.find_by("license", "MIT")?.len(), 1);
//! assert!(store.find_by("vendor", "acme").is_err());
//! # Ok::<(), hypergen::store::StoreError>(())
//! ```

mod error;

pub use error::{StoreError, StoreResult};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type KeyPartsFn<T> = Box<dyn Fn(&T) -> Vec<String> + Send + Sync>;
type AttributeFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;

/// How the ordered key parts are turned into a primary key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Parts joined with a separator, e.g. `generator::action`
    Joined(&'static str),
    /// Hex SHA-256 digest of the parts joined with a NUL byte
    Sha256,
}

impl Default for KeyFormat {
    fn default() -> Self {
        Self::Joined("::")
    }
}

impl KeyFormat {
    /// Build a key from ordered key parts
    #[must_use]
    pub fn compose<S: AsRef<str>>(self, parts: &[S]) -> String {
        match self {
            Self::Joined(separator) => parts
                .iter()
                .map(AsRef::as_ref)
                .collect::<Vec<_>>()
                .join(separator),
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        hasher.update([0u8]);
                    }
                    hasher.update(part.as_ref().as_bytes());
                }
                hex::encode(hasher.finalize())
            }
        }
    }
}

/// Argument accepted by [`IndexedStore::find`], [`IndexedStore::exists`] and
/// [`IndexedStore::remove`]
///
/// Keys are always strings, so an item can never be mistaken for a key.
#[derive(Debug)]
pub enum Lookup<'a, T> {
    /// Look up the key derived from a full item
    Item(&'a T),
    /// Look up a primary key directly
    Key(&'a str),
    /// Look up by the ordered key-part values
    Parts(&'a [&'a str]),
}

impl<T> Clone for Lookup<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Lookup<'_, T> {}

impl<'a, T> From<&'a str> for Lookup<'a, T> {
    fn from(key: &'a str) -> Self {
        Self::Key(key)
    }
}

impl<'a, T> From<&'a [&'a str]> for Lookup<'a, T> {
    fn from(parts: &'a [&'a str]) -> Self {
        Self::Parts(parts)
    }
}

struct Index<T> {
    extract: AttributeFn<T>,
    entries: HashMap<String, Vec<String>>,
}

impl<T> Index<T> {
    fn insert(&mut self, item: &T, key: &str) {
        let bucket = self.entries.entry((self.extract)(item)).or_default();
        if !bucket.iter().any(|k| k == key) {
            bucket.push(key.to_string());
        }
    }

    fn remove(&mut self, item: &T, key: &str) {
        let value = (self.extract)(item);
        if let Some(bucket) = self.entries.get_mut(&value) {
            bucket.retain(|k| k != key);
            if bucket.is_empty() {
                self.entries.remove(&value);
            }
        }
    }
}

/// Keyed container with O(1) primary lookup and declared secondary indices
///
/// The store is not internally synchronized; mutate it from one logical
/// sequence of operations at a time.
pub struct IndexedStore<T> {
    name: &'static str,
    arity: usize,
    key_parts: KeyPartsFn<T>,
    format: KeyFormat,
    items: HashMap<String, Arc<T>>,
    order: Vec<String>,
    indices: HashMap<&'static str, Index<T>>,
}

impl<T> fmt::Debug for IndexedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedStore")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("format", &self.format)
            .field("len", &self.items.len())
            .field("indices", &self.indices())
            .finish()
    }
}

impl<T> IndexedStore<T> {
    /// Create an empty store whose key is built from `arity` ordered parts
    ///
    /// Keys default to [`KeyFormat::Joined`] with a `::` separator.
    pub fn new<F>(name: &'static str, arity: usize, key_parts: F) -> Self
    where
        F: Fn(&T) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            name,
            arity,
            key_parts: Box::new(key_parts),
            format: KeyFormat::default(),
            items: HashMap::new(),
            order: Vec::new(),
            indices: HashMap::new(),
        }
    }

    /// Use a different key format
    ///
    /// Meant for construction time; existing items keep the keys they were stored under.
    #[must_use]
    pub fn with_key_format(mut self, format: KeyFormat) -> Self {
        self.format = format;
        self
    }

    /// Declare a secondary index on an attribute
    ///
    /// Items already present are indexed immediately.
    #[must_use]
    pub fn with_index<F>(mut self, attribute: &'static str, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        let mut index = Index {
            extract: Box::new(extract),
            entries: HashMap::new(),
        };
        for key in &self.order {
            if let Some(item) = self.items.get(key) {
                index.insert(item, key);
            }
        }
        self.indices.insert(attribute, index);
        self
    }

    /// Name of the store, used in diagnostics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store holds no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Declared index attributes, sorted
    #[must_use]
    pub fn indices(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.indices.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Primary keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Compute the primary key of an item
    pub fn key_of(&self, item: &T) -> String {
        self.format.compose(&(self.key_parts)(item))
    }

    /// Compute the primary key from ordered key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] if the number of parts does not match the
    /// store's key definition.
    pub fn key_from_parts(&self, parts: &[&str]) -> StoreResult<String> {
        if parts.len() != self.arity {
            return Err(StoreError::KeyArity {
                store: self.name,
                expected: self.arity,
                got: parts.len(),
            });
        }
        Ok(self.format.compose(parts))
    }

    fn resolve_key(&self, lookup: Lookup<'_, T>) -> StoreResult<String> {
        match lookup {
            Lookup::Item(item) => Ok(self.key_of(item)),
            Lookup::Key(key) => Ok(key.to_string()),
            Lookup::Parts(parts) => self.key_from_parts(parts),
        }
    }

    /// Find the stored item whose key matches `item`'s key
    pub fn find_by_item(&self, item: &T) -> Option<Arc<T>> {
        self.find_by_key(&self.key_of(item))
    }

    /// Find an item by primary key
    #[must_use]
    pub fn find_by_key(&self, key: &str) -> Option<Arc<T>> {
        self.items.get(key).cloned()
    }

    /// Find an item by its ordered key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] on a part-count mismatch.
    pub fn find_by_key_parts(&self, parts: &[&str]) -> StoreResult<Option<Arc<T>>> {
        Ok(self.find_by_key(&self.key_from_parts(parts)?))
    }

    /// Find an item by item, key or key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] when looking up by mismatched key parts.
    pub fn find(&self, lookup: Lookup<'_, T>) -> StoreResult<Option<Arc<T>>> {
        Ok(self.find_by_key(&self.resolve_key(lookup)?))
    }

    /// Whether an item with `item`'s key is stored
    pub fn exists_by_item(&self, item: &T) -> bool {
        self.exists_by_key(&self.key_of(item))
    }

    /// Whether a primary key is stored
    #[must_use]
    pub fn exists_by_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Whether an item with the given key parts is stored
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] on a part-count mismatch.
    pub fn exists_by_key_parts(&self, parts: &[&str]) -> StoreResult<bool> {
        Ok(self.exists_by_key(&self.key_from_parts(parts)?))
    }

    /// Whether an item is stored, looked up by item, key or key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] when looking up by mismatched key parts.
    pub fn exists(&self, lookup: Lookup<'_, T>) -> StoreResult<bool> {
        Ok(self.exists_by_key(&self.resolve_key(lookup)?))
    }

    /// Remove the item stored under `item`'s key
    pub fn remove_by_item(&mut self, item: &T) -> Option<Arc<T>> {
        let key = self.key_of(item);
        self.remove_by_key(&key)
    }

    /// Remove an item by primary key, scrubbing it from every declared index
    pub fn remove_by_key(&mut self, key: &str) -> Option<Arc<T>> {
        let item = self.items.remove(key)?;
        for index in self.indices.values_mut() {
            index.remove(&item, key);
        }
        self.order.retain(|k| k != key);
        Some(item)
    }

    /// Remove an item by its ordered key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] on a part-count mismatch.
    pub fn remove_by_key_parts(&mut self, parts: &[&str]) -> StoreResult<Option<Arc<T>>> {
        let key = self.key_from_parts(parts)?;
        Ok(self.remove_by_key(&key))
    }

    /// Remove an item by item, key or key parts
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::KeyArity`] when removing by mismatched key parts.
    pub fn remove(&mut self, lookup: Lookup<'_, T>) -> StoreResult<Option<Arc<T>>> {
        let key = self.resolve_key(lookup)?;
        Ok(self.remove_by_key(&key))
    }

    /// Items whose `attribute` equals `value`, in no guaranteed order
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UndeclaredIndex`] if `attribute` was never declared with
    /// [`with_index`](Self::with_index).
    pub fn find_by(&self, attribute: &str, value: &str) -> StoreResult<Vec<Arc<T>>> {
        let index = self
            .indices
            .get(attribute)
            .ok_or_else(|| StoreError::UndeclaredIndex {
                store: self.name,
                attribute: attribute.to_string(),
            })?;
        Ok(index
            .entries
            .get(value)
            .map(|keys| keys.iter().filter_map(|k| self.items.get(k).cloned()).collect())
            .unwrap_or_default())
    }

    /// All items in insertion order
    #[must_use]
    pub fn list_all(&self) -> Vec<Arc<T>> {
        self.iter().cloned().collect()
    }

    /// Iterate over items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.order.iter().filter_map(|k| self.items.get(k))
    }
}

impl<T: Serialize> IndexedStore<T> {
    fn describe(item: &T) -> String {
        serde_json::to_string(item).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }

    /// Insert an item and update every declared index
    ///
    /// Re-adding the very same `Arc` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if a different item is already stored
    /// under the same key.
    pub fn add(&mut self, item: impl Into<Arc<T>>) -> StoreResult<Arc<T>> {
        let item = item.into();
        let key = self.key_of(&item);

        if let Some(existing) = self.items.get(&key) {
            if Arc::ptr_eq(existing, &item) {
                return Ok(item);
            }
            return Err(StoreError::DuplicateKey {
                store: self.name,
                key,
                existing: Self::describe(existing),
                incoming: Self::describe(&item),
            });
        }

        for index in self.indices.values_mut() {
            index.insert(&item, &key);
        }
        self.items.insert(key.clone(), Arc::clone(&item));
        self.order.push(key);
        Ok(item)
    }
}

#[cfg(test)]
impl<T> IndexedStore<T> {
    /// Every stored item sits in every index under its current attribute value,
    /// and no index references a missing key.
    fn assert_consistent(&self) {
        assert_eq!(self.items.len(), self.order.len());
        for (attribute, index) in &self.indices {
            let mut seen = 0;
            for (value, keys) in &index.entries {
                assert!(!keys.is_empty(), "empty bucket `{value}` left in `{attribute}`");
                for key in keys {
                    let item = self
                        .items
                        .get(key)
                        .unwrap_or_else(|| panic!("orphaned key `{key}` in `{attribute}`"));
                    assert_eq!(&(index.extract)(item), value);
                    seen += 1;
                }
            }
            assert_eq!(seen, self.items.len(), "index `{attribute}` is incomplete");
        }
    }
}
