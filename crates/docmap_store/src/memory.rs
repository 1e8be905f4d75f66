//! In-memory document store.

use std::collections::{BTreeMap, VecDeque};

use docmap_codec::{Decode, Document, DocumentId, Encode, Value};
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::{
    ChangeStream, DocumentCursor, DocumentStore, FindRequest, IndexInfo, UpsertOutcome,
    WriteDurability, ID_FIELD, ID_INDEX_NAME,
};
use crate::change::{ChangeFeed, OperationType};
use crate::error::{StoreError, StoreResult};
use crate::matcher;

/// One stored document, kept as canonical bytes so stored state never
/// aliases caller-owned documents.
#[derive(Debug, Clone)]
struct Row {
    id: DocumentId,
    bytes: Vec<u8>,
}

impl Row {
    fn document(&self) -> StoreResult<Document> {
        Ok(Document::decode(&self.bytes)?)
    }
}

#[derive(Debug)]
struct Collection {
    rows: Vec<Row>,
    indexes: Vec<IndexInfo>,
}

impl Collection {
    fn new() -> Self {
        let mut id_keys = Document::new();
        id_keys.insert(ID_FIELD, 1);
        Self {
            rows: Vec::new(),
            indexes: vec![IndexInfo::new(ID_INDEX_NAME, id_keys, true)],
        }
    }

    fn position(&self, filter: &Document) -> StoreResult<Option<(usize, Document)>> {
        for (i, row) in self.rows.iter().enumerate() {
            let doc = row.document()?;
            if matcher::matches(&doc, filter)? {
                return Ok(Some((i, doc)));
            }
        }
        Ok(None)
    }

    /// Rejects `doc` if it collides with another row on a unique index.
    fn check_unique(&self, name: &str, doc: &Document, skip: Option<usize>) -> StoreResult<()> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let key = index_key(doc, index);
            for (i, row) in self.rows.iter().enumerate() {
                if Some(i) == skip {
                    continue;
                }
                let other = index_key(&row.document()?, index);
                if key
                    .iter()
                    .zip(&other)
                    .all(|(a, b)| matcher::values_equal(a, b))
                {
                    return Err(StoreError::DuplicateKey {
                        collection: name.to_string(),
                        index: index.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn index_key(doc: &Document, index: &IndexInfo) -> Vec<Value> {
    index
        .paths()
        .map(|path| {
            matcher::resolve(doc, path)
                .first()
                .map_or(Value::Null, |v| (*v).clone())
        })
        .collect()
}

/// Puts `_id` first, generating one if missing.
fn with_id(mut doc: Document) -> (DocumentId, Document) {
    let id = match doc.remove(ID_FIELD) {
        Some(Value::Id(id)) => id,
        _ => DocumentId::generate(),
    };
    let mut out = Document::with_capacity(doc.len() + 1);
    out.insert(ID_FIELD, id);
    for (k, v) in doc {
        out.insert(k, v);
    }
    (id, out)
}

/// An in-memory document store.
///
/// This store keeps every collection in memory and is suitable for:
/// - Unit and integration tests
/// - Embedding applications that do not need persistence
///
/// It supports the full [`DocumentStore`] surface except `$regex`
/// filters. Write durability is accepted and ignored.
///
/// # Thread Safety
///
/// All operations take a single read or write lock, so each call is
/// atomic with respect to other calls.
///
/// # Example
///
/// ```rust
/// use docmap_codec::Document;
/// use docmap_store::{DocumentStore, MemoryStore, WriteDurability};
///
/// let store = MemoryStore::new();
/// let mut doc = Document::new();
/// doc.insert("name", "alice");
/// store.insert("users", doc, WriteDurability::Acknowledged).unwrap();
///
/// let mut filter = Document::new();
/// filter.insert("name", "alice");
/// assert!(store.exists("users", &filter).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Collection>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection; zero if it does not exist.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.rows.len())
    }

    /// Returns true if the collection is missing or empty.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    fn insert_locked(
        &self,
        collections: &mut BTreeMap<String, Collection>,
        name: &str,
        document: Document,
    ) -> StoreResult<DocumentId> {
        let coll = collections
            .entry(name.to_string())
            .or_insert_with(Collection::new);
        let (id, doc) = with_id(document);
        coll.check_unique(name, &doc, None)?;
        coll.rows.push(Row {
            id,
            bytes: doc.encode()?,
        });
        self.feed
            .emit(name, OperationType::Insert, Some(id), Some(doc));
        Ok(id)
    }
}

impl DocumentStore for MemoryStore {
    fn find_one(&self, collection: &str, filter: &Document) -> StoreResult<Option<Document>> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(None);
        };
        Ok(coll.position(filter)?.map(|(_, doc)| doc))
    }

    fn upsert(
        &self,
        collection: &str,
        filter: &Document,
        update: Document,
        _durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome> {
        let mut collections = self.collections.write();
        let found = match collections.get(collection) {
            Some(coll) => coll.position(filter)?,
            None => None,
        };

        match found {
            Some((pos, mut doc)) => {
                for (key, value) in update {
                    if key != ID_FIELD {
                        doc.insert(key, value);
                    }
                }
                let coll = collections
                    .get_mut(collection)
                    .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
                coll.check_unique(collection, &doc, Some(pos))?;
                let id = coll.rows[pos].id;
                coll.rows[pos].bytes = doc.encode()?;
                self.feed
                    .emit(collection, OperationType::Update, Some(id), None);
                Ok(UpsertOutcome {
                    inserted: false,
                    id,
                })
            }
            None => {
                let mut seeded = Document::new();
                for (path, value) in filter.iter() {
                    if !path.starts_with('$') && !matches!(value, Value::Document(d) if d.keys().any(|k| k.starts_with('$')))
                    {
                        seeded.set_path(path, value.clone());
                    }
                }
                for (key, value) in update {
                    seeded.insert(key, value);
                }
                let id = self.insert_locked(&mut collections, collection, seeded)?;
                Ok(UpsertOutcome { inserted: true, id })
            }
        }
    }

    fn replace(
        &self,
        collection: &str,
        filter: &Document,
        replacement: Document,
        _durability: WriteDurability,
    ) -> StoreResult<UpsertOutcome> {
        let mut collections = self.collections.write();
        let found = match collections.get(collection) {
            Some(coll) => coll.position(filter)?,
            None => None,
        };

        match found {
            Some((pos, _)) => {
                let coll = collections
                    .get_mut(collection)
                    .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
                let id = coll.rows[pos].id;
                let mut doc = replacement;
                doc.insert(ID_FIELD, id);
                let (_, doc) = with_id(doc);
                coll.check_unique(collection, &doc, Some(pos))?;
                coll.rows[pos].bytes = doc.encode()?;
                self.feed
                    .emit(collection, OperationType::Replace, Some(id), Some(doc));
                Ok(UpsertOutcome {
                    inserted: false,
                    id,
                })
            }
            None => {
                let id = self.insert_locked(&mut collections, collection, replacement)?;
                Ok(UpsertOutcome { inserted: true, id })
            }
        }
    }

    fn insert(
        &self,
        collection: &str,
        document: Document,
        _durability: WriteDurability,
    ) -> StoreResult<DocumentId> {
        let mut collections = self.collections.write();
        self.insert_locked(&mut collections, collection, document)
    }

    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        _durability: WriteDurability,
    ) -> StoreResult<Vec<DocumentId>> {
        let mut collections = self.collections.write();
        documents
            .into_iter()
            .map(|doc| self.insert_locked(&mut collections, collection, doc))
            .collect()
    }

    fn delete_one(
        &self,
        collection: &str,
        filter: &Document,
        _durability: WriteDurability,
    ) -> StoreResult<bool> {
        let mut collections = self.collections.write();
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some((pos, _)) = coll.position(filter)? else {
            return Ok(false);
        };
        let row = coll.rows.remove(pos);
        self.feed
            .emit(collection, OperationType::Delete, Some(row.id), None);
        Ok(true)
    }

    fn find(&self, collection: &str, request: &FindRequest) -> StoreResult<Box<dyn DocumentCursor>> {
        let collections = self.collections.read();
        let mut hits = Vec::new();
        if let Some(coll) = collections.get(collection) {
            for row in &coll.rows {
                let doc = row.document()?;
                if matcher::matches(&doc, &request.filter)? {
                    hits.push(doc);
                }
            }
        }
        drop(collections);

        if !request.sort.is_empty() {
            hits.sort_by(|a, b| matcher::sort_cmp(a, b, &request.sort));
        }
        let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
        let limit = request
            .limit
            .filter(|l| *l > 0)
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        let mut results = VecDeque::new();
        for doc in hits.into_iter().skip(skip).take(limit) {
            let doc = match &request.projection {
                Some(projection) => matcher::project(&doc, projection, ID_FIELD)?,
                None => doc,
            };
            results.push_back(doc);
        }
        debug!(collection, matched = results.len(), "memory find");
        Ok(Box::new(MemoryCursor {
            results,
            closed: false,
        }))
    }

    fn count(&self, collection: &str, filter: &Document) -> StoreResult<u64> {
        let collections = self.collections.read();
        let Some(coll) = collections.get(collection) else {
            return Ok(0);
        };
        let mut n = 0u64;
        for row in &coll.rows {
            if matcher::matches(&row.document()?, filter)? {
                n += 1;
            }
        }
        Ok(n)
    }

    fn collection_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn create_collection(&self, collection: &str) -> StoreResult<()> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_insert_with(Collection::new);
        Ok(())
    }

    fn drop_collection(&self, collection: &str) -> StoreResult<()> {
        let removed = self.collections.write().remove(collection);
        if removed.is_some() {
            debug!(collection, "collection dropped");
        }
        self.feed.invalidate(collection);
        Ok(())
    }

    fn list_indexes(&self, collection: &str) -> StoreResult<Vec<IndexInfo>> {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.indexes.clone())
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))
    }

    fn create_index(&self, collection: &str, index: &IndexInfo) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if let Some(existing) = coll.indexes.iter().find(|i| i.name == index.name) {
            if existing == index {
                return Ok(());
            }
            return Err(StoreError::IndexConflict {
                collection: collection.to_string(),
                name: index.name.clone(),
            });
        }

        if index.unique {
            let mut seen: Vec<Vec<Value>> = Vec::new();
            for row in &coll.rows {
                let key = index_key(&row.document()?, index);
                if seen.iter().any(|s| {
                    s.iter().zip(&key).all(|(a, b)| matcher::values_equal(a, b))
                }) {
                    return Err(StoreError::DuplicateKey {
                        collection: collection.to_string(),
                        index: index.name.clone(),
                    });
                }
                seen.push(key);
            }
        }
        coll.indexes.push(index.clone());
        Ok(())
    }

    fn drop_index(&self, collection: &str, name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let coll = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        let before = coll.indexes.len();
        coll.indexes.retain(|i| i.name != name || i.name == ID_INDEX_NAME);
        if coll.indexes.len() == before {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> StoreResult<Box<dyn ChangeStream>> {
        Ok(Box::new(self.feed.subscribe(collection)))
    }
}

/// Cursor over a fully materialized result set.
#[derive(Debug)]
struct MemoryCursor {
    results: VecDeque<Document>,
    closed: bool,
}

impl DocumentCursor for MemoryCursor {
    fn next_document(&mut self) -> StoreResult<Option<Document>> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(self.results.pop_front())
    }

    fn try_next_document(&mut self) -> StoreResult<Option<Document>> {
        self.next_document()
    }

    fn close(&mut self) {
        self.closed = true;
        self.results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACK: WriteDurability = WriteDurability::Acknowledged;

    fn doc(pairs: Vec<(&str, Value)>) -> Document {
        pairs.into_iter().collect()
    }

    fn drain(mut cursor: Box<dyn DocumentCursor>) -> Vec<Document> {
        let mut out = Vec::new();
        while let Some(d) = cursor.next_document().unwrap() {
            out.push(d);
        }
        out
    }

    #[test]
    fn upsert_inserts_then_updates() {
        let store = MemoryStore::new();
        let filter = doc(vec![("k", Value::from("a"))]);

        let first = store
            .upsert("c", &filter, doc(vec![("n", Value::Integer(1))]), ACK)
            .unwrap();
        assert!(first.inserted);

        let second = store
            .upsert("c", &filter, doc(vec![("n", Value::Integer(2))]), ACK)
            .unwrap();
        assert!(!second.inserted);
        assert_eq!(first.id, second.id);

        let stored = store.find_one("c", &filter).unwrap().unwrap();
        assert_eq!(stored.get("k"), Some(&Value::from("a")));
        assert_eq!(stored.get("n"), Some(&Value::Integer(2)));
        assert_eq!(stored.get(ID_FIELD), Some(&Value::Id(first.id)));
        assert_eq!(store.len("c"), 1);
    }

    #[test]
    fn upsert_keeps_fields_missing_from_update() {
        let store = MemoryStore::new();
        let filter = doc(vec![("k", Value::Integer(1))]);
        store
            .upsert("c", &filter, doc(vec![("a", Value::Integer(1)), ("b", Value::Integer(2))]), ACK)
            .unwrap();
        store
            .upsert("c", &filter, doc(vec![("a", Value::Integer(9))]), ACK)
            .unwrap();

        let stored = store.find_one("c", &filter).unwrap().unwrap();
        assert_eq!(stored.get("a"), Some(&Value::Integer(9)));
        assert_eq!(stored.get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn replace_overwrites_whole_document() {
        let store = MemoryStore::new();
        let filter = doc(vec![("k", Value::Integer(1))]);
        let id = store
            .insert("c", doc(vec![("k", Value::Integer(1)), ("old", Value::Bool(true))]), ACK)
            .unwrap();

        let outcome = store
            .replace("c", &filter, doc(vec![("k", Value::Integer(1))]), ACK)
            .unwrap();
        assert!(!outcome.inserted);
        assert_eq!(outcome.id, id);

        let stored = store.find_one("c", &filter).unwrap().unwrap();
        assert!(!stored.contains_key("old"));
    }

    #[test]
    fn unique_index_rejects_duplicates() {
        let store = MemoryStore::new();
        store.create_collection("c").unwrap();
        let keys = doc(vec![("k", Value::Integer(1))]);
        store
            .create_index("c", &IndexInfo::new("__key_", keys, true))
            .unwrap();

        store.insert("c", doc(vec![("k", Value::Integer(7))]), ACK).unwrap();
        let err = store
            .insert("c", doc(vec![("k", Value::Integer(7))]), ACK)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
    }

    #[test]
    fn index_administration() {
        let store = MemoryStore::new();
        assert!(store.list_indexes("c").is_err());
        store.create_collection("c").unwrap();

        let idx = IndexInfo::new("__regular_n", doc(vec![("n", Value::Integer(1))]), false);
        store.create_index("c", &idx).unwrap();
        store.create_index("c", &idx).unwrap();
        let names: Vec<String> = store.list_indexes("c").unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec![ID_INDEX_NAME.to_string(), "__regular_n".to_string()]);

        store.drop_index("c", "__regular_n").unwrap();
        assert!(matches!(
            store.drop_index("c", "__regular_n"),
            Err(StoreError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn find_sorts_skips_limits_and_projects() {
        let store = MemoryStore::new();
        for n in [3, 1, 2, 5, 4] {
            store
                .insert("c", doc(vec![("n", Value::Integer(n)), ("x", Value::Bool(true))]), ACK)
                .unwrap();
        }
        let request = FindRequest {
            sort: doc(vec![("n", Value::Integer(-1))]),
            skip: 1,
            limit: Some(2),
            projection: Some(doc(vec![("x", Value::Integer(0))])),
            ..FindRequest::default()
        };
        let found = drain(store.find("c", &request).unwrap());
        let ns: Vec<_> = found.iter().map(|d| d.get("n").cloned()).collect();
        assert_eq!(ns, vec![Some(Value::Integer(4)), Some(Value::Integer(3))]);
        assert!(found.iter().all(|d| !d.contains_key("x")));
    }

    #[test]
    fn count_and_delete() {
        let store = MemoryStore::new();
        store.insert("c", doc(vec![("n", Value::Integer(1))]), ACK).unwrap();
        store.insert("c", doc(vec![("n", Value::Integer(1))]), ACK).unwrap();
        let filter = doc(vec![("n", Value::Integer(1))]);
        assert_eq!(store.count("c", &filter).unwrap(), 2);

        assert!(store.delete_one("c", &filter, ACK).unwrap());
        assert_eq!(store.count("c", &filter).unwrap(), 1);
        assert!(!store.delete_one("missing", &filter, ACK).unwrap());
    }

    #[test]
    fn change_events_follow_writes() {
        let store = MemoryStore::new();
        let mut stream = store.watch("c").unwrap();
        let filter = doc(vec![("k", Value::Integer(1))]);

        store.upsert("c", &filter, Document::new(), ACK).unwrap();
        store.upsert("c", &filter, doc(vec![("n", Value::Integer(2))]), ACK).unwrap();
        store.replace("c", &filter, doc(vec![("k", Value::Integer(1))]), ACK).unwrap();
        store.delete_one("c", &filter, ACK).unwrap();

        let ops: Vec<(OperationType, bool)> = std::iter::from_fn(|| stream.try_next_event().unwrap())
            .map(|e| (e.operation, e.full_document.is_some()))
            .collect();
        assert_eq!(
            ops,
            vec![
                (OperationType::Insert, true),
                (OperationType::Update, false),
                (OperationType::Replace, true),
                (OperationType::Delete, false),
            ]
        );
    }

    #[test]
    fn drop_collection_invalidates_watchers() {
        let store = MemoryStore::new();
        store.insert("c", Document::new(), ACK).unwrap();
        let mut stream = store.watch("c").unwrap();

        store.drop_collection("c").unwrap();
        assert!(store.collection_names().unwrap().is_empty());

        let last = std::iter::from_fn(|| stream.next_event().unwrap()).last().unwrap();
        assert_eq!(last.operation, OperationType::Invalidate);
    }

    #[test]
    fn closed_cursor_errors() {
        let store = MemoryStore::new();
        let mut cursor = store.find("c", &FindRequest::default()).unwrap();
        cursor.close();
        cursor.close();
        assert!(matches!(cursor.next_document(), Err(StoreError::Closed)));
    }
}
