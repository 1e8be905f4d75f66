//! Type descriptors and the schema builder.
//!
//! An entity type states its layout once through [`Schema`]; the
//! registry turns that into an immutable [`TypeDescriptor`] shared by the
//! codec, the traversal and the filter builder.

mod descriptor;
pub(crate) mod registry;
mod shape;

use std::any::TypeId;
use std::collections::HashSet;

pub use descriptor::{FieldDescriptor, FieldTags, TypeDescriptor};
pub use shape::{EntityType, ScalarKind, Shape};

use docmap_store::ID_FIELD;

use crate::error::{CoreError, CoreResult};
use crate::field::FieldType;

/// Declarative layout of an entity type.
///
/// # Example
///
/// ```rust,ignore
/// fn schema() -> Schema {
///     Schema::new("Order")
///         .key::<String>("number")
///         .field::<i32>("quantity")
///         .full_save::<Address>("ship_to")
///         .reference::<Customer>("customer")
///         .indexed::<String>("status")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    kind: String,
    shallow: bool,
    ignore_null: bool,
    ignore_unknown_properties: bool,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Starts a schema for the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            shallow: false,
            ignore_null: false,
            ignore_unknown_properties: false,
            fields: Vec::new(),
        }
    }

    /// Marks the type as shallow: embeddable only, never stored alone.
    #[must_use]
    pub fn shallow(mut self) -> Self {
        self.shallow = true;
        self
    }

    /// Omits null fields when the type is stored.
    #[must_use]
    pub fn ignore_null(mut self) -> Self {
        self.ignore_null = true;
        self
    }

    /// Skips document fields the type does not declare when decoding.
    #[must_use]
    pub fn ignore_unknown_properties(mut self) -> Self {
        self.ignore_unknown_properties = true;
        self
    }

    /// Declares an identity field.
    #[must_use]
    pub fn key<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE.identity())
    }

    /// Declares a plain field.
    #[must_use]
    pub fn field<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE)
    }

    /// Declares a field whose nested entities are embedded in full.
    #[must_use]
    pub fn full_save<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE.full_save())
    }

    /// Declares a field whose nested entities are stored by key only and
    /// never cascaded.
    #[must_use]
    pub fn reference<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE.reference())
    }

    /// Declares a field backed by a unique index.
    #[must_use]
    pub fn unique<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE.unique())
    }

    /// Declares a field backed by a non-unique index.
    #[must_use]
    pub fn indexed<F: FieldType>(self, name: &'static str) -> Self {
        self.field_with::<F>(name, FieldTags::NONE.indexed())
    }

    /// Declares a field with an explicit tag set.
    #[must_use]
    pub fn field_with<F: FieldType>(mut self, name: &'static str, tags: FieldTags) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            shape: F::shape(),
            nullable: F::nullable(),
            tags,
        });
        self
    }

    /// Kind this schema declares.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub(crate) fn build(self, type_name: &'static str, type_id: TypeId) -> CoreResult<TypeDescriptor> {
        if self.kind.is_empty() {
            return Err(CoreError::MissingKind { type_name });
        }
        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD {
                return Err(CoreError::ReservedField {
                    kind: self.kind.clone(),
                    field: field.name.to_string(),
                });
            }
            if !names.insert(field.name) {
                return Err(CoreError::DuplicateField {
                    kind: self.kind.clone(),
                    field: field.name.to_string(),
                });
            }
            if field.tags.full_save && field.tags.reference {
                return Err(CoreError::ConflictingTags {
                    kind: self.kind.clone(),
                    field: field.name.to_string(),
                });
            }
        }
        Ok(TypeDescriptor {
            kind: self.kind,
            type_name,
            type_id,
            shallow: self.shallow,
            ignore_null: self.ignore_null,
            ignore_unknown_properties: self.ignore_unknown_properties,
            fields: self.fields,
        })
    }
}
