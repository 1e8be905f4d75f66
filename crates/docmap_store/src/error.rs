//! Error types for store operations.

use docmap_codec::CodecError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors a document store can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would create a second document with the same values for a
    /// unique index.
    #[error("duplicate key in '{collection}' for index '{index}'")]
    DuplicateKey {
        /// Collection the write targeted.
        collection: String,
        /// Name of the violated unique index.
        index: String,
    },

    /// The named collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The named index does not exist.
    #[error("index '{name}' not found on '{collection}'")]
    IndexNotFound {
        /// Collection that was searched.
        collection: String,
        /// Requested index name.
        name: String,
    },

    /// An index with the same name but a different definition exists.
    #[error("index '{name}' already exists on '{collection}' with a different definition")]
    IndexConflict {
        /// Collection holding the index.
        collection: String,
        /// Conflicting index name.
        name: String,
    },

    /// The filter, projection or sort document is malformed.
    #[error("invalid query document: {0}")]
    InvalidQuery(String),

    /// The store does not implement an operator or feature.
    #[error("unsupported by this store: {0}")]
    Unsupported(String),

    /// The cursor or change stream was closed.
    #[error("stream is closed")]
    Closed,

    /// Stored bytes could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Failure reported by a remote or embedded backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}
