//! Per-entity operations on the default datastore.
//!
//! [`EntityExt`] is implemented for every [`Entity`] and forwards to
//! [`Datastore::default_store`], so application code can write
//! `order.save(true)?` once a default datastore is installed.

use docmap_store::WriteDurability;

use crate::codec::to_json;
use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::error::CoreResult;
use crate::key::Key;

/// Entity operations routed through the default datastore.
///
/// Every method except [`EntityExt::key`] and [`EntityExt::to_json`]
/// fails with [`CoreError::NoDefaultStore`](crate::CoreError::NoDefaultStore)
/// when no default datastore is installed.
pub trait EntityExt: Entity {
    /// Identity of the entity.
    ///
    /// # Errors
    ///
    /// Returns an encode error of an identity field.
    fn key(&self) -> CoreResult<Key> {
        Key::of(self)
    }

    /// Returns true if both entities denote the same stored document.
    ///
    /// Keyed entities compare by [`Key`]. Keyless entities compare by
    /// document identifier and are never the same before their first
    /// save.
    ///
    /// # Errors
    ///
    /// Returns an encode error of an identity field.
    fn same_identity(&self, other: &Self) -> CoreResult<bool> {
        let key = Key::of(self)?;
        if key.is_empty() {
            let id = self.header().document_id();
            return Ok(id.is_some() && id == other.header().document_id());
        }
        Ok(key == Key::of(other)?)
    }

    /// See [`Datastore::exists`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::exists`].
    fn exists(&self) -> CoreResult<bool> {
        Datastore::default_store()?.exists(self)
    }

    /// See [`Datastore::load`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::load`].
    fn load(&mut self, cascade: bool) -> CoreResult<bool> {
        Datastore::default_store()?.load(self, cascade)
    }

    /// See [`Datastore::save`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::save`].
    fn save(&mut self, cascade: bool) -> CoreResult<bool> {
        Datastore::default_store()?.save(self, cascade)
    }

    /// See [`Datastore::save_with`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::save_with`].
    fn save_with(&mut self, cascade: bool, durability: WriteDurability) -> CoreResult<bool> {
        Datastore::default_store()?.save_with(self, cascade, durability)
    }

    /// See [`Datastore::replace`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::replace`].
    fn replace(&mut self) -> CoreResult<()> {
        Datastore::default_store()?.replace(self)
    }

    /// See [`Datastore::delete`].
    ///
    /// # Errors
    ///
    /// Same as [`Datastore::delete`].
    fn delete(&mut self, cascade: bool) -> CoreResult<bool> {
        Datastore::default_store()?.delete(self, cascade)
    }

    /// Presentation JSON of the entity.
    ///
    /// # Errors
    ///
    /// Returns an encode error.
    fn to_json(&self, omit_null: bool) -> CoreResult<String> {
        to_json(self, omit_null)
    }
}

impl<T: Entity> EntityExt for T {}
