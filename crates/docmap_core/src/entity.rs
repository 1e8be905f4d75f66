//! Entity trait and per-instance header.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use docmap_codec::DocumentId;

use crate::error::CoreResult;
use crate::field::Slot;
use crate::key::Key;
use crate::schema::{registry, Schema, TypeDescriptor};

/// Mapping state every entity instance carries.
///
/// Holds the memoized [`Key`] and the store-assigned document
/// identifier. Entities embed one and expose it through
/// [`Entity::header`].
#[derive(Debug, Clone, Default)]
pub struct EntityHeader {
    key: OnceLock<Key>,
    id: Option<DocumentId>,
}

/// Headers compare by document identifier only; the memoized key is
/// ignored. A derived `PartialEq` on an entity therefore compares its
/// fields plus the identifier. Identity equality by [`Key`] is
/// [`EntityExt::same_identity`](crate::EntityExt::same_identity), since
/// deriving a key can fail.
impl PartialEq for EntityHeader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl EntityHeader {
    /// Creates an empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store-assigned identifier, known once the entity was saved or
    /// loaded.
    pub fn document_id(&self) -> Option<DocumentId> {
        self.id
    }

    /// Returns true if the instance has been persisted or fetched.
    pub fn is_loaded(&self) -> bool {
        self.id.is_some()
    }

    /// Forgets the memoized key.
    ///
    /// The key is computed once per instance; call this after changing
    /// identity fields of an instance whose key was already taken.
    pub fn reset_key(&mut self) {
        self.key = OnceLock::new();
    }

    pub(crate) fn set_document_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    pub(crate) fn cached_key(&self) -> Option<&Key> {
        self.key.get()
    }

    pub(crate) fn remember_key(&self, key: Key) {
        // A concurrent first computation produced an equal key.
        let _ = self.key.set(key);
    }
}

/// A type mapped to one collection of documents.
///
/// Implementations declare their layout once through [`Entity::schema`]
/// and give name-based access to the declared fields. Every field named
/// in the schema must be reachable through both [`Entity::field`] and
/// [`Entity::field_mut`].
///
/// # Example
///
/// ```rust
/// use docmap_core::{Entity, EntityHeader, Schema, Slot};
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
/// ```
pub trait Entity: Default + 'static {
    /// Declares kind, flags and fields.
    fn schema() -> Schema;

    /// Mapping header.
    fn header(&self) -> &EntityHeader;

    /// Mutable mapping header.
    fn header_mut(&mut self) -> &mut EntityHeader;

    /// Declared field by name.
    fn field(&self, name: &str) -> Option<&dyn Slot>;

    /// Mutable declared field by name.
    fn field_mut(&mut self, name: &str) -> Option<&mut dyn Slot>;
}

/// Object-safe view of any [`Entity`].
///
/// Lets the codec and the traversal work on heterogeneous entity graphs.
pub trait AnyEntity {
    /// Descriptor of the concrete type, registering it if needed.
    ///
    /// # Errors
    ///
    /// Returns the registration error of the type.
    fn descriptor(&self) -> CoreResult<Arc<TypeDescriptor>>;

    /// Mapping header.
    fn entity_header(&self) -> &EntityHeader;

    /// Mutable mapping header.
    fn entity_header_mut(&mut self) -> &mut EntityHeader;

    /// Declared field by name.
    fn slot(&self, name: &str) -> Option<&dyn Slot>;

    /// Mutable declared field by name.
    fn slot_mut(&mut self, name: &str) -> Option<&mut dyn Slot>;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> AnyEntity for T {
    fn descriptor(&self) -> CoreResult<Arc<TypeDescriptor>> {
        registry::describe::<T>()
    }

    fn entity_header(&self) -> &EntityHeader {
        self.header()
    }

    fn entity_header_mut(&mut self) -> &mut EntityHeader {
        self.header_mut()
    }

    fn slot(&self, name: &str) -> Option<&dyn Slot> {
        self.field(name)
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut dyn Slot> {
        self.field_mut(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Part;

    #[test]
    fn header_starts_unloaded() {
        let mut header = EntityHeader::new();
        assert!(!header.is_loaded());
        assert!(header.document_id().is_none());

        let id = DocumentId::generate();
        header.set_document_id(id);
        assert!(header.is_loaded());
        assert_eq!(header.document_id(), Some(id));
    }

    #[test]
    fn reset_forgets_key() {
        let part = Part::new("p1", 1);
        let key = Key::of(&part).unwrap();
        assert_eq!(part.header().cached_key(), Some(&key));

        let mut part = part;
        part.header_mut().reset_key();
        assert!(part.header().cached_key().is_none());
    }

    #[test]
    fn any_entity_downcasts() {
        let part = Part::new("p1", 1);
        let erased: &dyn AnyEntity = &part;
        assert_eq!(erased.descriptor().unwrap().kind(), "Part");
        assert!(erased.as_any().downcast_ref::<Part>().is_some());
    }
}
