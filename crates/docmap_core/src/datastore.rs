//! Datastore facade.
//!
//! A [`Datastore`] binds the mapping engine to one [`DocumentStore`]. It
//! owns the configuration and a cache of per-kind collection handles.
//! The first access to a kind creates its collection and reconciles the
//! indexes the type declares; concurrent first accesses are serialized.

use std::collections::HashMap;
use std::sync::Arc;

use docmap_codec::{Document, DocumentId};
use docmap_store::{
    DocumentStore, IndexInfo, MemoryStore, WriteDurability, ID_FIELD, ID_INDEX_NAME,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::codec::{encode_entity, EncodeContext, ExportPolicy};
use crate::config::Config;
use crate::entity::{AnyEntity, Entity};
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::query::Query;
use crate::schema::{registry, TypeDescriptor};
use crate::traversal::{id_filter, Action, Walk};
use crate::watch::{ChangeWatcher, WatchMode};

static DEFAULT: RwLock<Option<Datastore>> = parking_lot::const_rwlock(None);

/// Indexes reconciled for one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHandle {
    kind: String,
    key_index: Option<IndexInfo>,
    secondary: Vec<IndexInfo>,
}

impl CollectionHandle {
    /// Kind, which is also the collection name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Reserved unique index over the key fields, if the kind has a key
    /// and reconciliation is enabled.
    pub fn key_index(&self) -> Option<&IndexInfo> {
        self.key_index.as_ref()
    }

    /// Indexes declared through unique- and index-tagged fields.
    pub fn secondary_indexes(&self) -> &[IndexInfo] {
        &self.secondary
    }
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    config: Config,
    collections: Mutex<HashMap<String, Arc<CollectionHandle>>>,
}

/// Entry point for persisting, loading, querying and watching entities.
///
/// Cloning is cheap; clones share the store and the handle cache.
///
/// # Example
///
/// ```rust
/// use docmap_core::{Datastore, Entity, EntityHeader, Schema, Slot};
///
/// #[derive(Debug, Default)]
/// struct Counter {
///     header: EntityHeader,
///     id: String,
///     n: i32,
/// }
///
/// impl Entity for Counter {
///     fn schema() -> Schema {
///         Schema::new("Counter").key::<String>("id").field::<i32>("n")
///     }
///     fn header(&self) -> &EntityHeader {
///         &self.header
///     }
///     fn header_mut(&mut self) -> &mut EntityHeader {
///         &mut self.header
///     }
///     fn field(&self, name: &str) -> Option<&dyn Slot> {
///         match name {
///             "id" => Some(&self.id),
///             "n" => Some(&self.n),
///             _ => None,
///         }
///     }
///     fn field_mut(&mut self, name: &str) -> Option<&mut dyn Slot> {
///         match name {
///             "id" => Some(&mut self.id),
///             "n" => Some(&mut self.n),
///             _ => None,
///         }
///     }
/// }
///
/// let ds = Datastore::memory();
/// let mut counter = Counter { id: "x".into(), n: 5, ..Counter::default() };
/// assert!(ds.save(&mut counter, false).unwrap());
///
/// let mut fresh = Counter { id: "x".into(), ..Counter::default() };
/// assert!(ds.load(&mut fresh, false).unwrap());
/// assert_eq!(fresh.n, 5);
/// ```
#[derive(Clone)]
pub struct Datastore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("config", &self.inner.config)
            .field("collections", &self.inner.collections.lock().len())
            .finish_non_exhaustive()
    }
}

impl Datastore {
    /// Creates a datastore over `store` with the default configuration.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, Config::default())
    }

    /// Creates a datastore over `store`.
    pub fn with_config(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                collections: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a datastore over a fresh [`MemoryStore`].
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Installs `datastore` as the process-wide default used by
    /// [`EntityExt`](crate::EntityExt).
    pub fn set_default(datastore: Datastore) {
        *DEFAULT.write() = Some(datastore);
    }

    /// Returns the process-wide default datastore.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoDefaultStore`] if none was installed.
    pub fn default_store() -> CoreResult<Datastore> {
        DEFAULT.read().clone().ok_or(CoreError::NoDefaultStore)
    }

    /// Removes the process-wide default datastore.
    pub fn clear_default() {
        *DEFAULT.write() = None;
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Underlying document store.
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Returns true if a document with the entity's key, or its document
    /// identifier for keyless types, exists.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] for shallow types,
    /// [`CoreError::EmptyKey`] for a keyless entity that was never stored,
    /// or a store error.
    pub fn exists(&self, entity: &dyn AnyEntity) -> CoreResult<bool> {
        let desc = standalone(entity, "check")?;
        let filter = address(entity, &desc)?;
        self.ensure_collection(&desc)?;
        Ok(self.store().exists(desc.kind(), &filter)?)
    }

    /// Fetches the entity's document by key and decodes it into `entity`.
    ///
    /// With `cascade`, entities reachable through non-reference fields
    /// are loaded as well. Returns false if the entity, or any cascaded
    /// entity, was not found.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] for shallow types,
    /// [`CoreError::EmptyKey`] for keyless entities without identifier,
    /// or a decode or store error.
    pub fn load(&self, entity: &mut dyn AnyEntity, cascade: bool) -> CoreResult<bool> {
        Walk::new(self, Action::Load, cascade).run(entity)
    }

    /// Upserts the entity by key with the configured durability.
    ///
    /// Returns true if a new document was inserted. With `cascade`,
    /// entities reachable through non-reference fields are saved as well.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] for shallow types, or a store
    /// error. A failure mid-cascade leaves earlier writes in place.
    pub fn save(&self, entity: &mut dyn AnyEntity, cascade: bool) -> CoreResult<bool> {
        self.save_with(entity, cascade, self.config().write_durability)
    }

    /// Same as [`Datastore::save`] with an explicit durability.
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::save`].
    pub fn save_with(
        &self,
        entity: &mut dyn AnyEntity,
        cascade: bool,
        durability: WriteDurability,
    ) -> CoreResult<bool> {
        Walk::new(self, Action::Save(durability), cascade).run(entity)
    }

    /// Overwrites the stored document of the entity, or inserts it.
    ///
    /// Nested entities are not saved.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] for shallow types, or a store
    /// error.
    pub fn replace(&self, entity: &mut dyn AnyEntity) -> CoreResult<()> {
        let desc = standalone(entity, "replace")?;
        self.ensure_collection(&desc)?;
        let durability = self.config().write_durability;
        let doc = storage_document(entity, &desc)?;

        let key = Key::of(entity)?;
        let id = match (key.is_empty(), entity.entity_header().document_id()) {
            (false, _) => {
                self.store()
                    .replace(desc.kind(), key.filter_document(), doc, durability)?
                    .id
            }
            (true, Some(id)) => {
                self.store()
                    .replace(desc.kind(), &id_filter(id), doc, durability)?
                    .id
            }
            (true, None) => self.store().insert(desc.kind(), doc, durability)?,
        };
        entity.entity_header_mut().set_document_id(id);
        Ok(())
    }

    /// Deletes the entity's document.
    ///
    /// Returns true if a document was deleted. With `cascade`, entities
    /// reachable through non-reference fields are deleted first; entities
    /// behind reference fields are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] for shallow types or
    /// [`CoreError::EmptyKey`] if a reached type has no key, both before
    /// any store call, or a store error.
    pub fn delete(&self, entity: &mut dyn AnyEntity, cascade: bool) -> CoreResult<bool> {
        let durability = self.config().write_durability;
        Walk::new(self, Action::Delete(durability), cascade).run(entity)
    }

    /// Inserts entities in bulk, one store call per kind.
    ///
    /// Nested entities are not saved. Identifiers are assigned to the
    /// given entities.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShallowEntity`] before any store call if one
    /// of the entities is shallow, or the first store error.
    pub fn save_all(&self, entities: &mut [&mut dyn AnyEntity]) -> CoreResult<()> {
        let mut groups: Vec<(Arc<TypeDescriptor>, Vec<usize>)> = Vec::new();
        for (index, entity) in entities.iter().enumerate() {
            let desc = standalone(&**entity, "save")?;
            match groups.iter_mut().find(|(d, _)| d.kind() == desc.kind()) {
                Some((_, members)) => members.push(index),
                None => groups.push((desc, vec![index])),
            }
        }

        let durability = self.config().write_durability;
        for (desc, members) in groups {
            self.ensure_collection(&desc)?;
            let docs = members
                .iter()
                .map(|&i| storage_document(&*entities[i], &desc))
                .collect::<CoreResult<Vec<_>>>()?;
            let ids = self.store().insert_many(desc.kind(), docs, durability)?;
            for (&i, id) in members.iter().zip(ids) {
                entities[i].entity_header_mut().set_document_id(id);
            }
            debug!(kind = desc.kind(), count = members.len(), "bulk insert");
        }
        Ok(())
    }

    /// Starts a query over `T` with the configured batch size.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be registered.
    pub fn query<T: Entity>(&self) -> CoreResult<Query<T>> {
        Ok(Query::new()?.batch_size(self.config().batch_size))
    }

    /// Opens a change watcher over the collection of `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be registered or the store cannot
    /// open a stream.
    pub fn watch<T: Entity>(&self, mode: WatchMode) -> CoreResult<ChangeWatcher<T>> {
        let desc = registry::describe::<T>()?;
        self.ensure_collection(&desc)?;
        let stream = self.store().watch(desc.kind())?;
        debug!(kind = desc.kind(), ?mode, "change watcher opened");
        Ok(ChangeWatcher::new(self.clone(), desc.kind(), stream, mode))
    }

    /// Names of all collections in the store.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn collection_names(&self) -> CoreResult<Vec<String>> {
        Ok(self.store().collection_names()?)
    }

    /// Handle of the collection of `T`, reconciling it on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be registered or an index cannot be
    /// reconciled.
    pub fn collection<T: Entity>(&self) -> CoreResult<Arc<CollectionHandle>> {
        self.ensure_collection(&*registry::describe::<T>()?)
    }

    /// Drops the collection of `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` cannot be registered, or a store error.
    pub fn drop_collection<T: Entity>(&self) -> CoreResult<()> {
        let desc = registry::describe::<T>()?;
        self.drop_kind(desc.kind())
    }

    /// Drops the collection of `kind` and forgets its handle, so the
    /// next access reconciles it again.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn drop_kind(&self, kind: &str) -> CoreResult<()> {
        let mut collections = self.inner.collections.lock();
        self.store().drop_collection(kind)?;
        collections.remove(kind);
        debug!(kind, "collection dropped");
        Ok(())
    }

    pub(crate) fn fetch_by_id(&self, kind: &str, id: DocumentId) -> CoreResult<Option<Document>> {
        Ok(self.store().find_one(kind, &id_filter(id))?)
    }

    pub(crate) fn load_nested(&self, entity: &mut dyn AnyEntity) -> CoreResult<bool> {
        Walk::new(self, Action::Load, true).run_nested(entity)
    }

    pub(crate) fn ensure_collection(&self, desc: &TypeDescriptor) -> CoreResult<Arc<CollectionHandle>> {
        let mut collections = self.inner.collections.lock();
        if let Some(handle) = collections.get(desc.kind()) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(self.initialize(desc)?);
        collections.insert(desc.kind().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn initialize(&self, desc: &TypeDescriptor) -> CoreResult<CollectionHandle> {
        let kind = desc.kind();
        self.store().create_collection(kind)?;
        let mut handle = CollectionHandle {
            kind: kind.to_string(),
            key_index: None,
            secondary: Vec::new(),
        };
        if self.config().reconcile_indexes {
            let existing = self.store().list_indexes(kind)?;
            handle.key_index = self.reconcile_key_index(desc, &existing)?;
            handle.secondary = self.reconcile_secondary(desc, &existing)?;
        }
        debug!(kind, "collection initialized");
        Ok(handle)
    }

    fn reconcile_key_index(
        &self,
        desc: &TypeDescriptor,
        existing: &[IndexInfo],
    ) -> CoreResult<Option<IndexInfo>> {
        let kind = desc.kind();
        let name = &self.config().key_index_name;
        let spec = desc.key_index_spec()?;
        let wanted = (!spec.is_empty()).then(|| IndexInfo::new(name.as_str(), spec.clone(), true));

        let current = existing.iter().find(|index| {
            index.name != ID_INDEX_NAME
                && (index.name == *name || (!spec.is_empty() && index.keys == spec))
        });

        match (current, wanted) {
            (Some(current), Some(wanted)) if *current == wanted => Ok(Some(wanted)),
            (Some(current), wanted) => {
                self.store().drop_index(kind, &current.name)?;
                info!(kind, index = %current.name, "dropped stale key index");
                if let Some(wanted) = &wanted {
                    self.store().create_index(kind, wanted)?;
                    info!(kind, index = %wanted.name, "created key index");
                }
                Ok(wanted)
            }
            (None, Some(wanted)) => {
                self.store().create_index(kind, &wanted)?;
                info!(kind, index = %wanted.name, "created key index");
                Ok(Some(wanted))
            }
            (None, None) => Ok(None),
        }
    }

    fn reconcile_secondary(
        &self,
        desc: &TypeDescriptor,
        existing: &[IndexInfo],
    ) -> CoreResult<Vec<IndexInfo>> {
        let kind = desc.kind();
        let config = self.config();
        let single = |field: &str| {
            let mut keys = Document::new();
            keys.insert(field, 1);
            keys
        };
        let wanted: Vec<IndexInfo> = desc
            .unique_fields()
            .map(|f| {
                IndexInfo::new(
                    format!("{}{}", config.unique_index_prefix, f.name()),
                    single(f.name()),
                    true,
                )
            })
            .chain(desc.indexed_fields().map(|f| {
                IndexInfo::new(
                    format!("{}{}", config.regular_index_prefix, f.name()),
                    single(f.name()),
                    false,
                )
            }))
            .collect();

        for index in &wanted {
            match existing.iter().find(|e| e.name == index.name) {
                Some(current) if current == index => continue,
                Some(current) => {
                    self.store().drop_index(kind, &current.name)?;
                    info!(kind, index = %current.name, "dropped changed index");
                }
                None => {}
            }
            self.store().create_index(kind, index)?;
            info!(kind, index = %index.name, unique = index.unique, "created index");
        }

        for index in existing {
            let managed = index.name.starts_with(&config.unique_index_prefix)
                || index.name.starts_with(&config.regular_index_prefix);
            if managed && !wanted.iter().any(|w| w.name == index.name) {
                self.store().drop_index(kind, &index.name)?;
                info!(kind, index = %index.name, "dropped obsolete index");
            }
        }
        Ok(wanted)
    }
}

fn standalone(entity: &dyn AnyEntity, operation: &'static str) -> CoreResult<Arc<TypeDescriptor>> {
    let desc = entity.descriptor()?;
    if desc.is_shallow() {
        return Err(CoreError::ShallowEntity {
            kind: desc.kind().to_string(),
            operation,
        });
    }
    Ok(desc)
}

fn address(entity: &dyn AnyEntity, desc: &TypeDescriptor) -> CoreResult<Document> {
    let key = Key::of(entity)?;
    if !key.is_empty() {
        return Ok(key.filter_document().clone());
    }
    entity
        .entity_header()
        .document_id()
        .map(id_filter)
        .ok_or_else(|| CoreError::EmptyKey {
            kind: desc.kind().to_string(),
        })
}

pub(crate) fn storage_document(entity: &dyn AnyEntity, desc: &TypeDescriptor) -> CoreResult<Document> {
    let policy = if desc.ignores_null() {
        ExportPolicy::STORAGE_IGNORE_NULL
    } else {
        ExportPolicy::STORAGE
    };
    let mut doc = encode_entity(entity, &EncodeContext::new(policy))?;
    doc.remove(ID_FIELD);
    Ok(doc)
}
