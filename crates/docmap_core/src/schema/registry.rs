//! Process-wide kind to type registry.
//!
//! Each entity type is registered at most once. Registration builds the
//! type's [`TypeDescriptor`] from its [`Schema`](crate::Schema), binds
//! its kind, then registers every entity type reachable through its
//! fields. Lookups after the first registration take a read lock only.

use std::any::{type_name, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::schema::descriptor::TypeDescriptor;

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, Arc<TypeDescriptor>>,
    by_kind: HashMap<String, Arc<TypeDescriptor>>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// Registers `T` and returns its descriptor.
///
/// Registering an already registered type returns the existing
/// descriptor.
///
/// # Errors
///
/// Returns a configuration error if the schema is invalid or its kind is
/// bound to another type, for `T` or any entity type reachable from it.
pub fn register<T: Entity>() -> CoreResult<Arc<TypeDescriptor>> {
    let descriptor = describe::<T>()?;
    let mut seen = HashSet::from([descriptor.type_id()]);
    register_reachable(&descriptor, &mut seen)?;
    Ok(descriptor)
}

fn register_reachable(descriptor: &TypeDescriptor, seen: &mut HashSet<TypeId>) -> CoreResult<()> {
    for field in descriptor.fields() {
        if let Some(entity) = field.shape().entity() {
            if seen.insert(entity.type_id()) {
                let nested = entity.descriptor()?;
                register_reachable(&nested, seen)?;
            }
        }
    }
    Ok(())
}

/// Returns the descriptor of `T`, registering it on first use.
///
/// # Errors
///
/// Same as [`register`], limited to `T` itself.
pub fn describe<T: Entity>() -> CoreResult<Arc<TypeDescriptor>> {
    let id = TypeId::of::<T>();
    if let Some(found) = registry().read().by_type.get(&id) {
        return Ok(Arc::clone(found));
    }

    let built = T::schema().build(type_name::<T>(), id)?;

    let mut reg = registry().write();
    if let Some(found) = reg.by_type.get(&id) {
        return Ok(Arc::clone(found));
    }
    if let Some(existing) = reg.by_kind.get(built.kind()) {
        return Err(CoreError::KindConflict {
            kind: built.kind().to_string(),
            existing: existing.type_name(),
            requested: built.type_name(),
        });
    }

    let descriptor = Arc::new(built);
    reg.by_type.insert(id, Arc::clone(&descriptor));
    reg.by_kind
        .insert(descriptor.kind().to_string(), Arc::clone(&descriptor));
    debug!(
        kind = descriptor.kind(),
        type_name = descriptor.type_name(),
        fields = descriptor.fields().len(),
        "entity type registered"
    );
    Ok(descriptor)
}

/// Looks up the descriptor bound to `kind`.
///
/// # Errors
///
/// Returns [`CoreError::UnregisteredKind`] if no type claimed the kind.
pub fn registered_kind(kind: &str) -> CoreResult<Arc<TypeDescriptor>> {
    registry()
        .read()
        .by_kind
        .get(kind)
        .cloned()
        .ok_or_else(|| CoreError::UnregisteredKind {
            kind: kind.to_string(),
        })
}

/// Returns true if `T` has been registered.
pub fn is_registered<T: Entity>() -> bool {
    registry().read().by_type.contains_key(&TypeId::of::<T>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityHeader;
    use crate::field::Slot;
    use crate::schema::Schema;
    use crate::test_support::{Owner, Part};

    #[derive(Debug, Default)]
    struct Impostor {
        header: EntityHeader,
        code: String,
    }

    impl Entity for Impostor {
        fn schema() -> Schema {
            Schema::new("Part").key::<String>("code")
        }
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn field(&self, name: &str) -> Option<&dyn Slot> {
            match name {
                "code" => Some(&self.code),
                _ => None,
            }
        }
        fn field_mut(&mut self, name: &str) -> Option<&mut dyn Slot> {
            match name {
                "code" => Some(&mut self.code),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default)]
    struct Nameless {
        header: EntityHeader,
    }

    impl Entity for Nameless {
        fn schema() -> Schema {
            Schema::new("")
        }
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn field(&self, _name: &str) -> Option<&dyn Slot> {
            None
        }
        fn field_mut(&mut self, _name: &str) -> Option<&mut dyn Slot> {
            None
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let first = register::<Part>().unwrap();
        let second = register::<Part>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_registered::<Part>());
        assert_eq!(registered_kind("Part").unwrap().type_id(), TypeId::of::<Part>());
    }

    #[test]
    fn nested_types_register_with_owner() {
        register::<Owner>().unwrap();
        assert!(is_registered::<Part>());
    }

    #[test]
    fn second_type_cannot_claim_kind() {
        register::<Part>().unwrap();
        let err = register::<Impostor>().unwrap_err();
        assert!(matches!(err, CoreError::KindConflict { ref kind, .. } if kind == "Part"));
        assert!(err.is_configuration());
        assert!(!is_registered::<Impostor>());
    }

    #[test]
    fn empty_kind_is_rejected() {
        let err = register::<Nameless>().unwrap_err();
        assert!(matches!(err, CoreError::MissingKind { .. }));
    }

    #[test]
    fn unknown_kind_lookup_fails() {
        assert!(matches!(
            registered_kind("NoSuchKind"),
            Err(CoreError::UnregisteredKind { .. })
        ));
    }
}
