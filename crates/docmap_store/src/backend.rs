//! Document store trait definition.

use docmap_codec::{Document, DocumentId};

use crate::change::ChangeEvent;
use crate::error::StoreResult;

/// Name of the identifier field every stored document carries.
pub const ID_FIELD: &str = "_id";

/// Name of the implicit unique index over [`ID_FIELD`].
pub const ID_INDEX_NAME: &str = "_id_";

/// Acknowledgement level requested for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDurability {
    /// Fire and forget.
    Unacknowledged,
    /// Acknowledged by the primary.
    #[default]
    Acknowledged,
    /// Acknowledged after the write reached the journal.
    Journaled,
    /// Acknowledged by a majority of replicas.
    Majority,
}

/// Outcome of an upsert or replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// True if no document matched and a new one was inserted.
    pub inserted: bool,
    /// Identifier of the written document.
    pub id: DocumentId,
}

/// A named index over one or more document paths.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// Index name.
    pub name: String,
    /// Ordered `{path: direction}` specification.
    pub keys: Document,
    /// Whether the index rejects duplicate values.
    pub unique: bool,
}

impl IndexInfo {
    /// Creates an index definition.
    pub fn new(name: impl Into<String>, keys: Document, unique: bool) -> Self {
        Self {
            name: name.into(),
            keys,
            unique,
        }
    }

    /// Paths covered by this index, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.keys.keys()
    }
}

/// A query against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    /// Filter document; empty matches everything.
    pub filter: Document,
    /// Inclusion (`{path: 1}`) or exclusion (`{path: 0}`) projection.
    pub projection: Option<Document>,
    /// Ordered `{path: 1 | -1}` sort specification.
    pub sort: Document,
    /// Number of leading matches to skip.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Number of documents fetched per round trip.
    pub batch_size: u32,
}

impl Default for FindRequest {
    fn default() -> Self {
        Self {
            filter: Document::new(),
            projection: None,
            sort: Document::new(),
            skip: 0,
            limit: None,
            batch_size: 1000,
        }
    }
}

/// A document store: the external collaborator every mapped operation
/// ends up calling.
///
/// Stores own persistence, filtering, indexing and change notification.
/// They know nothing about mapped types; collections are addressed by
/// kind name and documents are plain [`Document`]s.
///
/// # Invariants
///
/// - Every stored document carries an [`ID_FIELD`] assigned on insert and
///   never changed afterwards
/// - `upsert` applies set semantics: fields absent from the update keep
///   their stored value
/// - Unique indexes are enforced on every write
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - in-process store for tests and embedding
pub trait DocumentStore: Send + Sync {
    /// Returns the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is malformed or the backend fails.
    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>>;

    /// Returns true if any document matches `filter`.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::find_one`].
    fn exists(&self, collection: &str, filter: &Document) -> StoreResult<bool> {
        Ok(self.find_one(collection, filter)?.is_some())
    }

    /// Sets the fields of `update` on the first document matching
    /// `filter`, inserting a new document if none matches.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::DuplicateKey`] if a unique index would
    /// be violated.
    fn upsert(
        &self,
        collection: &str,
        filter: &Document,
        update: Document,
        durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome>;

    /// Replaces the whole first document matching `filter`, inserting
    /// `replacement` if none matches.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::upsert`].
    fn replace(
        &self,
        collection: &str,
        filter: &Document,
        replacement: Document,
        durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome>;

    /// Inserts one document and returns its identifier.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::upsert`].
    fn insert(
        &self,
        collection: &str,
        document: Document,
        durability: WriteDurability,
    ) -> StoreResult<DocumentId>;

    /// Inserts documents in order and returns their identifiers.
    ///
    /// # Errors
    ///
    /// Stops at the first failing document.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        durability: WriteDurability,
    ) -> StoreResult<Vec<DocumentId>>;

    /// Deletes the first document matching `filter`.
    ///
    /// Returns true if a document was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is malformed or the backend fails.
    fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
        durability: WriteDurability,
    ) -> StoreResult<bool>;

    /// Runs a query and returns a cursor over the results.
    ///
    /// # Errors
    ///
    /// Returns an error if any request document is malformed.
    fn find(&self, collection: &str, request: &FindRequest) -> StoreResult<Box<dyn DocumentCursor>>;

    /// Counts documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter is malformed.
    fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64>;

    /// Names of all existing collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn collection_names(&self) -> StoreResult<Vec<String>>;

    /// Creates a collection if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn create_collection(&self, collection: &str) -> StoreResult<()>;

    /// Drops a collection with its documents and indexes.
    ///
    /// Open change streams on the collection receive a drop followed by an
    /// invalidate event.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn drop_collection(&self, collection: &str) -> StoreResult<()>;

    /// Lists the indexes of a collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::CollectionNotFound`] for unknown
    /// collections.
    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexInfo>>;

    /// Creates an index. Creating an identical index again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::DuplicateKey`] if existing documents
    /// violate a unique index, or [`crate::StoreError::IndexConflict`] if
    /// the name is taken by a different definition.
    fn create_index(&self, collection: &str, index: &IndexInfo) -> StoreResult<()>;

    /// Drops an index by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::IndexNotFound`] for unknown names.
    fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()>;

    /// Opens a change stream over one collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open a stream.
    fn watch(&self, collection: &str) -> StoreResult<Box<dyn ChangeStream>>;
}

/// Results of a [`DocumentStore::find`] call.
pub trait DocumentCursor: Send {
    /// Returns the next document, waiting for the backend if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn next_document(&mut self) -> StoreResult<Option<Document>>;

    /// Returns the next document only if it is available without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn try_next_document(&mut self) -> StoreResult<Option<Document>>;

    /// Releases backend resources. Idempotent.
    fn close(&mut self);
}

/// A stream of change events over one collection.
pub trait ChangeStream: Send {
    /// Waits for the next event. Returns `None` once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn next_event(&mut self) -> StoreResult<Option<ChangeEvent>>;

    /// Returns the next event only if one is already available.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn try_next_event(&mut self) -> StoreResult<Option<ChangeEvent>>;

    /// Stops the stream. Idempotent.
    fn close(&mut self);
}
