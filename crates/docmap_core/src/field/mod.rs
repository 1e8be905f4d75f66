//! Field types.
//!
//! [`FieldType`] gives every supported Rust type a static [`Shape`],
//! an encoding to [`Value`] and back, and access to the entities it
//! holds. [`Slot`] is its object-safe face, which is what
//! [`Entity::field`](crate::Entity::field) hands out.

mod container;
mod scalar;

use std::any::type_name;

use docmap_codec::Value;

use crate::codec::{decode, encode_nested, EncodeContext};
use crate::entity::{AnyEntity, Entity};
use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::{EntityType, ScalarKind, Shape};

/// Callback applied to each entity reachable through a field.
pub type EntityVisitor<'a> = dyn FnMut(&mut dyn AnyEntity) -> CoreResult<()> + 'a;

/// A type that can be declared as an entity field.
pub trait FieldType: Sized {
    /// Static shape of the type.
    fn shape() -> Shape;

    /// Whether the type can hold null.
    fn nullable() -> bool {
        false
    }

    /// Encodes the value.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested value cannot be encoded.
    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value>;

    /// Decodes a stored value.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `value` does not fit the type.
    fn from_value(value: &Value) -> CoreResult<Self>;

    /// Returns true if the value is null.
    fn is_null_value(&self) -> bool {
        false
    }

    /// Applies `visit` to each entity held by the value.
    ///
    /// # Errors
    ///
    /// Returns the first error of `visit`.
    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        let _ = visit;
        Ok(())
    }

    /// Normalizes the value into a filter operand.
    ///
    /// Entities become their flattened key filter and enums their name.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn to_operand(&self) -> CoreResult<Value> {
        self.to_value(&EncodeContext::identity())
    }
}

/// Object-safe access to one declared field of an entity.
pub trait Slot {
    /// Encodes the field value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn encode_value(&self, ctx: &EncodeContext) -> CoreResult<Value>;

    /// Replaces the field value with a decoded one.
    ///
    /// A stored null leaves non-nullable fields untouched.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `value` does not fit the field type.
    fn decode_value(&mut self, value: &Value) -> CoreResult<()>;

    /// Returns true if the field holds null.
    fn is_null(&self) -> bool;

    /// Applies `visit` to each entity held by the field.
    ///
    /// # Errors
    ///
    /// Returns the first error of `visit`.
    fn for_each_entity(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()>;

    /// Field value as a filter operand.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded.
    fn operand(&self) -> CoreResult<Value>;
}

impl<T: FieldType> Slot for T {
    fn encode_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        self.to_value(ctx)
    }

    fn decode_value(&mut self, value: &Value) -> CoreResult<()> {
        if value.is_null() && !T::nullable() {
            return Ok(());
        }
        *self = T::from_value(value)?;
        Ok(())
    }

    fn is_null(&self) -> bool {
        self.is_null_value()
    }

    fn for_each_entity(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        self.visit_entities(visit)
    }

    fn operand(&self) -> CoreResult<Value> {
        self.to_operand()
    }
}

impl<T: Entity> FieldType for T {
    fn shape() -> Shape {
        Shape::Entity(EntityType::of::<T>())
    }

    fn to_value(&self, ctx: &EncodeContext) -> CoreResult<Value> {
        encode_nested(self, ctx)
    }

    fn from_value(value: &Value) -> CoreResult<Self> {
        match value {
            Value::Document(doc) => decode(doc),
            other => Err(CoreError::type_mismatch(type_name::<T>(), other)),
        }
    }

    fn visit_entities(&mut self, visit: &mut EntityVisitor<'_>) -> CoreResult<()> {
        visit(self)
    }

    fn to_operand(&self) -> CoreResult<Value> {
        Ok(Value::Document(Key::of(self)?.filter_document().clone()))
    }
}

/// A type usable as a map key.
///
/// Only string-keyed maps cascade save, load and delete to their values.
pub trait MapKey: Sized {
    /// Whether traversal descends into the map's values.
    const CASCADES: bool = false;

    /// Static shape of the key type.
    fn key_shape() -> Shape;

    /// Document field name for the key.
    fn to_key(&self) -> String;

    /// Parses a document field name.
    ///
    /// # Errors
    ///
    /// Returns a decode error if `key` does not name a value.
    fn from_key(key: &str) -> CoreResult<Self>;
}

impl MapKey for String {
    const CASCADES: bool = true;

    fn key_shape() -> Shape {
        Shape::Scalar(ScalarKind::Text)
    }

    fn to_key(&self) -> String {
        self.clone()
    }

    fn from_key(key: &str) -> CoreResult<Self> {
        Ok(key.to_string())
    }
}

/// An enum stored by variant name.
///
/// Implement this, then invoke [`enum_field!`](crate::enum_field) to make
/// the enum usable as a field and as a map key.
pub trait EnumField: Sized {
    /// Symbolic name of the variant.
    fn name(&self) -> &'static str;

    /// Variant with the given name.
    fn from_name(name: &str) -> Option<Self>;
}

/// Decodes an enum from its stored name.
///
/// # Errors
///
/// Returns [`CoreError::UnknownVariant`] for unknown names and
/// [`CoreError::TypeMismatch`] for non-text values.
pub fn decode_enum<E: EnumField>(value: &Value) -> CoreResult<E> {
    match value {
        Value::Text(name) => E::from_name(name).ok_or_else(|| CoreError::UnknownVariant {
            type_name: type_name::<E>(),
            name: name.clone(),
        }),
        other => Err(CoreError::type_mismatch(type_name::<E>(), other)),
    }
}

/// Implements [`FieldType`] and [`MapKey`] for enums implementing
/// [`EnumField`].
///
/// ```rust
/// use docmap_core::{enum_field, EnumField};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Color {
///     Red,
///     Blue,
/// }
///
/// impl EnumField for Color {
///     fn name(&self) -> &'static str {
///         match self {
///             Color::Red => "Red",
///             Color::Blue => "Blue",
///         }
///     }
///     fn from_name(name: &str) -> Option<Self> {
///         match name {
///             "Red" => Some(Color::Red),
///             "Blue" => Some(Color::Blue),
///             _ => None,
///         }
///     }
/// }
///
/// enum_field!(Color);
/// ```
#[macro_export]
macro_rules! enum_field {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::FieldType for $ty {
            fn shape() -> $crate::Shape {
                $crate::Shape::Enum {
                    type_name: ::std::any::type_name::<$ty>(),
                }
            }

            fn to_value(
                &self,
                _ctx: &$crate::EncodeContext,
            ) -> $crate::CoreResult<$crate::Value> {
                ::std::result::Result::Ok($crate::Value::Text(
                    ::std::string::ToString::to_string($crate::EnumField::name(self)),
                ))
            }

            fn from_value(value: &$crate::Value) -> $crate::CoreResult<Self> {
                $crate::decode_enum(value)
            }
        }

        impl $crate::MapKey for $ty {
            fn key_shape() -> $crate::Shape {
                <$ty as $crate::FieldType>::shape()
            }

            fn to_key(&self) -> ::std::string::String {
                ::std::string::ToString::to_string($crate::EnumField::name(self))
            }

            fn from_key(key: &str) -> $crate::CoreResult<Self> {
                $crate::decode_enum(&$crate::Value::Text(::std::string::ToString::to_string(key)))
            }
        }
    )+};
}
