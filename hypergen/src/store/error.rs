//! Errors raised by [`IndexedStore`](super::IndexedStore)

use thiserror::Error;

/// Errors that can occur while mutating or querying an indexed store
///
/// All variants signal programming or data-shape mistakes rather than transient
/// failures, so callers are expected to abort the current operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An item with the same key but a different identity is already stored
    #[error("duplicate key `{key}` in {store} store\n  existing: {existing}\n  incoming: {incoming}")]
    DuplicateKey {
        /// Name of the store that rejected the item
        store: &'static str,
        /// The colliding key
        key: String,
        /// Serialized form of the item already in the store
        existing: String,
        /// Serialized form of the rejected item
        incoming: String,
    },

    /// `find_by` was called with an attribute that was never declared as an index
    #[error("attribute `{attribute}` is not an index of the {store} store")]
    UndeclaredIndex {
        /// Name of the queried store
        store: &'static str,
        /// The attribute that was queried
        attribute: String,
    },

    /// The number of key parts does not match the store's key definition
    #[error("{store} store keys have {expected} part(s), got {got}")]
    KeyArity {
        /// Name of the queried store
        store: &'static str,
        /// Number of parts the key is built from
        expected: usize,
        /// Number of parts supplied by the caller
        got: usize,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
