//! Static field shapes.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::CoreResult;
use crate::schema::descriptor::TypeDescriptor;
use crate::schema::registry;

/// Scalar field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool`
    Bool,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `char`, stored as a one-character string.
    Char,
    /// `String`
    Text,
    /// UTC date/time, stored as epoch milliseconds.
    DateTime,
    /// Untyped [`docmap_codec::Value`].
    Value,
    /// Untyped [`docmap_codec::Document`].
    Document,
}

/// Handle to an entity type whose descriptor is resolved on demand.
///
/// Resolution goes through the registry, so self-referencing schemas do
/// not recurse while their descriptors are built.
#[derive(Clone, Copy)]
pub struct EntityType {
    type_name: &'static str,
    type_id: fn() -> TypeId,
    resolve: fn() -> CoreResult<Arc<TypeDescriptor>>,
}

impl EntityType {
    /// Handle for entity type `T`.
    pub fn of<T: Entity>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>,
            resolve: registry::describe::<T>,
        }
    }

    /// Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Rust type id.
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Registers the type if needed and returns its descriptor.
    ///
    /// # Errors
    ///
    /// Returns the registration error of the type.
    pub fn descriptor(&self) -> CoreResult<Arc<TypeDescriptor>> {
        (self.resolve)()
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.type_name)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for EntityType {}

/// Shape of a declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// A scalar value.
    Scalar(ScalarKind),
    /// An enum stored by variant name.
    Enum {
        /// Rust type name of the enum.
        type_name: &'static str,
    },
    /// A nested entity.
    Entity(EntityType),
    /// Fixed-size array (`Box<[T]>`).
    Array(Box<Shape>),
    /// Ordered list (`Vec<T>`).
    List(Box<Shape>),
    /// Set (`HashSet<T>`, `BTreeSet<T>`).
    Set(Box<Shape>),
    /// String- or enum-keyed map.
    Map {
        /// Key shape.
        key: Box<Shape>,
        /// Value shape.
        value: Box<Shape>,
    },
}

impl Shape {
    /// Returns true for arrays, lists, sets and maps.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Shape::Array(_) | Shape::List(_) | Shape::Set(_) | Shape::Map { .. }
        )
    }

    /// Element type of arrays, lists and sets, or value type of maps,
    /// followed through every container level.
    pub fn innermost(&self) -> &Shape {
        match self {
            Shape::Array(inner) | Shape::List(inner) | Shape::Set(inner) => inner.innermost(),
            Shape::Map { value, .. } => value.innermost(),
            other => other,
        }
    }

    /// Entity type reached through this shape, if any.
    pub fn entity(&self) -> Option<&EntityType> {
        match self.innermost() {
            Shape::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// Returns true if entities can be reached through this shape.
    pub fn contains_entity(&self) -> bool {
        self.entity().is_some()
    }

    /// Short label for diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Shape::Scalar(_) => "scalar",
            Shape::Enum { .. } => "enum",
            Shape::Entity(_) => "entity",
            Shape::Array(_) => "array",
            Shape::List(_) => "list",
            Shape::Set(_) => "set",
            Shape::Map { .. } => "map",
        }
    }
}
