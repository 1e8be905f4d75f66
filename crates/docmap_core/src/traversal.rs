//! Save, load and delete propagation over entity graphs.
//!
//! One walk serves all three operations. It acts on an entity, then
//! descends into every non-null entity reachable through fields that are
//! not reference-tagged: direct fields, arrays, lists, sets and
//! string-keyed maps. Shallow entities met on the way are not acted on,
//! only walked through.
//!
//! Every check that can fail without touching the store runs over the
//! whole reachable graph before the first store call.

use std::collections::{HashMap, HashSet};

use docmap_codec::{Document, DocumentId, Value};
use docmap_store::{WriteDurability, ID_FIELD};
use tracing::debug;

use crate::codec::decode_into;
use crate::datastore::{storage_document, Datastore};
use crate::entity::AnyEntity;
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::{FieldDescriptor, TypeDescriptor};

/// Terminal action of a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Save(WriteDurability),
    Load,
    Delete(WriteDurability),
}

impl Action {
    const fn name(self) -> &'static str {
        match self {
            Action::Save(_) => "save",
            Action::Load => "load",
            Action::Delete(_) => "delete",
        }
    }
}

pub(crate) fn id_filter(id: DocumentId) -> Document {
    let mut filter = Document::new();
    filter.insert(ID_FIELD, Value::Id(id));
    filter
}

fn owned_fields(desc: &TypeDescriptor) -> impl Iterator<Item = &FieldDescriptor> {
    desc.fields()
        .iter()
        .filter(|field| !field.is_reference() && field.shape().contains_entity())
}

fn unidentified(entity: &dyn AnyEntity) -> CoreResult<bool> {
    Ok(entity.entity_header().document_id().is_none() && Key::of(entity)?.is_empty())
}

fn missing_slot(desc: &TypeDescriptor, field: &FieldDescriptor) -> CoreError {
    CoreError::MissingSlot {
        kind: desc.kind().to_string(),
        field: field.name().to_string(),
    }
}

/// One save, load or delete call.
pub(crate) struct Walk<'a> {
    datastore: &'a Datastore,
    action: Action,
    cascade: bool,
    visited: HashSet<Key>,
    memo: HashMap<Key, Option<Document>>,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(datastore: &'a Datastore, action: Action, cascade: bool) -> Self {
        Self {
            datastore,
            action,
            cascade,
            visited: HashSet::new(),
            memo: HashMap::new(),
        }
    }

    /// Runs the walk from `root`.
    ///
    /// Save reports whether the root was inserted, load whether the root
    /// and every cascaded entity were found, delete whether the root was
    /// deleted.
    pub(crate) fn run(mut self, root: &mut dyn AnyEntity) -> CoreResult<bool> {
        let desc = root.descriptor()?;
        if desc.is_shallow() {
            return Err(CoreError::ShallowEntity {
                kind: desc.kind().to_string(),
                operation: self.action.name(),
            });
        }
        self.preflight(root, &desc, true)?;
        self.apply(root, &desc)
    }

    /// Loads the entities reachable from an already decoded `root`.
    pub(crate) fn run_nested(mut self, root: &mut dyn AnyEntity) -> CoreResult<bool> {
        let desc = root.descriptor()?;
        self.preflight(root, &desc, true)?;
        self.descend(root, &desc)
    }

    fn preflight(
        &self,
        entity: &mut dyn AnyEntity,
        desc: &TypeDescriptor,
        root: bool,
    ) -> CoreResult<()> {
        if !desc.is_shallow() {
            let unaddressable = match self.action {
                Action::Delete(_) => Key::of(entity)?.is_empty(),
                Action::Load => root && unidentified(entity)?,
                Action::Save(_) => false,
            };
            if unaddressable {
                return Err(CoreError::EmptyKey {
                    kind: desc.kind().to_string(),
                });
            }
        }
        if !self.cascade {
            return Ok(());
        }
        for field in owned_fields(desc) {
            let slot = entity
                .slot_mut(field.name())
                .ok_or_else(|| missing_slot(desc, field))?;
            slot.for_each_entity(&mut |child: &mut dyn AnyEntity| {
                let child_desc = child.descriptor()?;
                self.preflight(child, &child_desc, false)
            })
            .map_err(|e| e.in_field(field.name()))?;
        }
        Ok(())
    }

    fn apply(&mut self, entity: &mut dyn AnyEntity, desc: &TypeDescriptor) -> CoreResult<bool> {
        match self.action {
            Action::Save(durability) => self.save(entity, desc, durability),
            Action::Load => self.load(entity, desc),
            Action::Delete(durability) => self.delete(entity, desc, durability),
        }
    }

    fn save(
        &mut self,
        entity: &mut dyn AnyEntity,
        desc: &TypeDescriptor,
        durability: WriteDurability,
    ) -> CoreResult<bool> {
        let key = Key::of(entity)?;
        if !key.is_empty() && !self.visited.insert(key.clone()) {
            return Ok(false);
        }
        self.datastore.ensure_collection(desc)?;

        let doc = storage_document(entity, desc)?;

        let store = self.datastore.store();
        let kind = desc.kind();
        let known_id = entity.entity_header().document_id();
        let (inserted, id) = if !key.is_empty() {
            let outcome = store.upsert(kind, key.filter_document(), doc, durability)?;
            (outcome.inserted, outcome.id)
        } else if let Some(id) = known_id {
            let outcome = store.upsert(kind, &id_filter(id), doc, durability)?;
            (outcome.inserted, outcome.id)
        } else {
            (true, store.insert(kind, doc, durability)?)
        };
        entity.entity_header_mut().set_document_id(id);
        debug!(kind, %key, inserted, "entity saved");

        if self.cascade {
            self.descend(entity, desc)?;
        }
        Ok(inserted)
    }

    fn load(&mut self, entity: &mut dyn AnyEntity, desc: &TypeDescriptor) -> CoreResult<bool> {
        let key = Key::of(entity)?;
        let memoized = if key.is_empty() {
            None
        } else {
            self.memo.get(&key).cloned()
        };

        let (doc, revisit) = match memoized {
            Some(doc) => (doc, true),
            None => {
                let filter = match (key.is_empty(), entity.entity_header().document_id()) {
                    (false, _) => key.filter_document().clone(),
                    (true, Some(id)) => id_filter(id),
                    (true, None) => {
                        return Err(CoreError::EmptyKey {
                            kind: desc.kind().to_string(),
                        })
                    }
                };
                self.datastore.ensure_collection(desc)?;
                let doc = self.datastore.store().find_one(desc.kind(), &filter)?;
                if !key.is_empty() {
                    self.memo.insert(key.clone(), doc.clone());
                }
                (doc, false)
            }
        };

        let Some(doc) = doc else {
            debug!(kind = desc.kind(), %key, "entity not found");
            return Ok(false);
        };
        decode_into(entity, &doc)?;

        if self.cascade && !revisit {
            return self.descend(entity, desc);
        }
        Ok(true)
    }

    fn delete(
        &mut self,
        entity: &mut dyn AnyEntity,
        desc: &TypeDescriptor,
        durability: WriteDurability,
    ) -> CoreResult<bool> {
        let key = Key::of(entity)?;
        if key.is_empty() {
            return Err(CoreError::EmptyKey {
                kind: desc.kind().to_string(),
            });
        }
        if !self.visited.insert(key.clone()) {
            return Ok(false);
        }
        if self.cascade {
            self.descend(entity, desc)?;
        }

        let filter = match entity.entity_header().document_id() {
            Some(id) => id_filter(id),
            None => key.filter_document().clone(),
        };
        self.datastore.ensure_collection(desc)?;
        let deleted = self
            .datastore
            .store()
            .delete_one(desc.kind(), &filter, durability)?;
        debug!(kind = desc.kind(), %key, deleted, "entity deleted");
        Ok(deleted)
    }

    fn descend(&mut self, entity: &mut dyn AnyEntity, desc: &TypeDescriptor) -> CoreResult<bool> {
        let mut found = true;
        for field in owned_fields(desc) {
            let slot = entity
                .slot_mut(field.name())
                .ok_or_else(|| missing_slot(desc, field))?;
            if slot.is_null() {
                continue;
            }
            slot.for_each_entity(&mut |child: &mut dyn AnyEntity| {
                found &= self.visit(child)?;
                Ok(())
            })
            .map_err(|e| e.in_field(field.name()))?;
        }
        Ok(found)
    }

    fn visit(&mut self, child: &mut dyn AnyEntity) -> CoreResult<bool> {
        let desc = child.descriptor()?;
        if desc.is_shallow() {
            return self.descend(child, &desc);
        }
        // Nothing identifies the stored document of a keyless child that
        // was never saved, so it keeps what its owner embedded.
        if self.action == Action::Load && unidentified(child)? {
            debug!(kind = desc.kind(), "keyless entity left as embedded");
            return Ok(true);
        }
        self.apply(child, &desc)
    }
}
