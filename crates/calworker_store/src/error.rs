//! Error types for the store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store was used before `load` succeeded.
    #[error("store not loaded: {store}")]
    NotLoaded {
        /// Name of the store.
        store: String,
    },

    /// A document has the wrong shape.
    #[error("invalid record in {collection}: {reason}")]
    InvalidRecord {
        /// Collection the record belongs to.
        collection: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A required document does not exist.
    #[error("not found: {id} in {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Id that was not found.
        id: String,
    },

    /// A document could not be converted to or from its typed form.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if the error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
