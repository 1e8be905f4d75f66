//! Error types for docmap core.

use docmap_codec::{CodecError, Value};
use docmap_store::StoreError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docmap core operations.
///
/// Variants fall into three tiers, see [`CoreError::is_configuration`],
/// [`CoreError::is_invariant`] and [`CoreError::is_store`]. Decode
/// failures form a fourth group and are usually wrapped in
/// [`CoreError::Field`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// JSON rendering error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A type declared an empty kind.
    #[error("type {type_name} does not declare a kind")]
    MissingKind {
        /// Rust type name.
        type_name: &'static str,
    },

    /// A kind is already bound to another type.
    #[error("kind '{kind}' is bound to {existing}, cannot bind {requested}")]
    KindConflict {
        /// The contested kind.
        kind: String,
        /// Type currently bound to the kind.
        existing: &'static str,
        /// Type that attempted to bind it.
        requested: &'static str,
    },

    /// A field uses a name reserved by the mapping layer.
    #[error("field '{field}' of kind '{kind}' uses a reserved name")]
    ReservedField {
        /// Declaring kind.
        kind: String,
        /// Offending field name.
        field: String,
    },

    /// A field was declared twice.
    #[error("field '{field}' of kind '{kind}' is declared twice")]
    DuplicateField {
        /// Declaring kind.
        kind: String,
        /// Duplicated field name.
        field: String,
    },

    /// A field carries both the full-save and the reference tag.
    #[error("field '{field}' of kind '{kind}' cannot be both full-save and reference")]
    ConflictingTags {
        /// Declaring kind.
        kind: String,
        /// Offending field name.
        field: String,
    },

    /// A declared field has no accessor on the entity.
    #[error("field '{field}' of kind '{kind}' has no accessor")]
    MissingSlot {
        /// Declaring kind.
        kind: String,
        /// Field without accessor.
        field: String,
    },

    /// An operation needs a key but the type declares no identity fields.
    #[error("kind '{kind}' has an empty key")]
    EmptyKey {
        /// Kind with the empty key.
        kind: String,
    },

    /// No type is registered under the kind.
    #[error("no type registered for kind '{kind}'")]
    UnregisteredKind {
        /// Requested kind.
        kind: String,
    },

    /// A shallow entity was used standalone.
    #[error("cannot {operation} shallow entity of kind '{kind}'")]
    ShallowEntity {
        /// Shallow kind.
        kind: String,
        /// Rejected operation.
        operation: &'static str,
    },

    /// Include and exclude projections were mixed.
    #[error("projection conflict: {message}")]
    ProjectionConflict {
        /// Description of the conflict.
        message: String,
    },

    /// A filter path does not address a filterable field.
    #[error("invalid field path '{path}' for kind '{kind}': {reason}")]
    InvalidFieldPath {
        /// Full dotted path.
        path: String,
        /// Root kind of the query.
        kind: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// No default datastore was configured.
    #[error("no default datastore configured")]
    NoDefaultStore,

    /// A cursor or watcher has no further element.
    #[error("no such element: {message}")]
    NoSuchElement {
        /// Description of what was requested.
        message: String,
    },

    /// A stored value does not fit the declared field type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Declared type.
        expected: &'static str,
        /// What the document held.
        found: String,
    },

    /// A document field has no counterpart on the type.
    #[error("unknown property '{field}' for kind '{kind}'")]
    UnknownProperty {
        /// Decoded kind.
        kind: String,
        /// Unrecognized field name.
        field: String,
    },

    /// An enum name has no matching variant.
    #[error("unknown variant '{name}' for {type_name}")]
    UnknownVariant {
        /// Enum type name.
        type_name: &'static str,
        /// Stored name.
        name: String,
    },

    /// An error raised while processing one field.
    #[error("field '{field}': {source}")]
    Field {
        /// Dotted path of the failing field.
        field: String,
        /// Underlying error.
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates a type mismatch error for a stored value.
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: found.type_name().to_string(),
        }
    }

    /// Creates a projection conflict error.
    pub fn projection_conflict(message: impl Into<String>) -> Self {
        Self::ProjectionConflict {
            message: message.into(),
        }
    }

    /// Creates a no such element error.
    pub fn no_such_element(message: impl Into<String>) -> Self {
        Self::NoSuchElement {
            message: message.into(),
        }
    }

    /// Attributes this error to `field`, extending an existing path.
    #[must_use]
    pub fn in_field(self, field: &str) -> Self {
        match self {
            Self::Field {
                field: inner,
                source,
            } => Self::Field {
                field: format!("{field}.{inner}"),
                source,
            },
            other => Self::Field {
                field: field.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error with field attribution removed.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true for configuration errors raised before any I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::MissingKind { .. }
                | Self::KindConflict { .. }
                | Self::ReservedField { .. }
                | Self::DuplicateField { .. }
                | Self::ConflictingTags { .. }
                | Self::MissingSlot { .. }
                | Self::EmptyKey { .. }
                | Self::UnregisteredKind { .. }
        )
    }

    /// Returns true for library invariant violations.
    pub fn is_invariant(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::ShallowEntity { .. }
                | Self::ProjectionConflict { .. }
                | Self::InvalidFieldPath { .. }
                | Self::NoDefaultStore
                | Self::NoSuchElement { .. }
        )
    }

    /// Returns true for errors reported by the document store.
    pub fn is_store(&self) -> bool {
        matches!(self.root_cause(), Self::Store(_))
    }

    /// Returns true for errors raised while decoding a document.
    pub fn is_decode(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::TypeMismatch { .. } | Self::UnknownProperty { .. } | Self::UnknownVariant { .. }
        )
    }
}
