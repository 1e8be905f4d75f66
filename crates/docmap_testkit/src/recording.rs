//! A store decorator that records every call.
//!
//! Used to check which store operations an engine call performs, for
//! example that an invalid delete fails before any I/O or that a nested
//! load fetches each identity once.

use std::sync::Arc;

use docmap_codec::{Document, DocumentId};
use docmap_store::{
    ChangeStream, DocumentCursor, DocumentStore, FindRequest, IndexInfo, MemoryStore, StoreResult,
    UpsertOutcome, WriteDurability,
};
use parking_lot::Mutex;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Trait method name, e.g. `"upsert"`.
    pub operation: &'static str,
    /// Collection the call addressed; empty for store-wide calls.
    pub collection: String,
}

const WRITES: [&str; 5] = ["upsert", "replace", "insert", "insert_many", "delete_one"];

/// Delegates to an inner store and records each call.
pub struct RecordingStore {
    inner: Arc<dyn DocumentStore>,
    calls: Mutex<Vec<Call>>,
}

impl std::fmt::Debug for RecordingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingStore")
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl RecordingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Wraps a fresh [`MemoryStore`].
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls of `operation`.
    pub fn calls_of(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Number of calls of `operation` on `collection`.
    pub fn calls_on(&self, operation: &str, collection: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation && c.collection == collection)
            .count()
    }

    /// Number of document writes of any kind.
    pub fn writes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| WRITES.contains(&c.operation))
            .count()
    }

    /// Forgets recorded calls.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, operation: &'static str, collection: &str) {
        self.calls.lock().push(Call {
            operation,
            collection: collection.to_string(),
        });
    }
}

impl DocumentStore for RecordingStore {
    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>> {
        self.record("find_one", collection);
        self.inner.find_one(collection, filter)
    }

    fn exists(&self, collection: &str, filter: &Document) -> StoreResult<bool> {
        self.record("exists", collection);
        self.inner.exists(collection, filter)
    }

    fn upsert(
        &self,
        collection: &str,
        filter: &Document,
        update: Document,
        durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome> {
        self.record("upsert", collection);
        self.inner.upsert(collection, filter, update, durability)
    }

    fn replace(
        &self,
        collection: &str,
        filter: &Document,
        replacement: Document,
        durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome> {
        self.record("replace", collection);
        self.inner.replace(collection, filter, replacement, durability)
    }

    fn insert(
        &self,
        collection: &str,
        document: Document,
        durability: WriteDurability,
    ) -> StoreResult<DocumentId> {
        self.record("insert", collection);
        self.inner.insert(collection, document, durability)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        durability: WriteDurability,
    ) -> StoreResult<Vec<DocumentId>> {
        self.record("insert_many", collection);
        self.inner.insert_many(collection, documents, durability)
    }

    fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
        durability: WriteDurability,
    ) -> StoreResult<bool> {
        self.record("delete_one", collection);
        self.inner.delete_one(collection, filter, durability)
    }

    fn find(&self, collection: &str, request: &FindRequest) -> StoreResult<Box<dyn DocumentCursor>> {
        self.record("find", collection);
        self.inner.find(collection, request)
    }

    fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        self.record("count", collection);
        self.inner.count(collection, filter)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        self.record("collection_names", "");
        self.inner.collection_names()
    }

    fn create_collection(&self, collection: &str) -> StoreResult<()> {
        self.record("create_collection", collection);
        self.inner.create_collection(collection)
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        self.record("drop_collection", collection);
        self.inner.drop_collection(collection)
    }

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexInfo>> {
        self.record("list_indexes", collection);
        self.inner.list_indexes(collection)
    }

    fn create_index(&self, collection: &str, index: &IndexInfo) -> StoreResult<()> {
        self.record("create_index", collection);
        self.inner.create_index(collection, index)
    }

    fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()> {
        self.record("drop_index", collection);
        self.inner.drop_index(collection, name)
    }

    fn watch(&self, collection: &str) -> StoreResult<Box<dyn ChangeStream>> {
        self.record("watch", collection);
        self.inner.watch(collection)
    }
}
