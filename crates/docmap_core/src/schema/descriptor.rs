//! Per-type descriptors.

use std::any::TypeId;
use std::collections::HashSet;

use docmap_codec::Document;

use crate::error::CoreResult;
use crate::schema::shape::Shape;

/// Policy tags attached to a declared field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldTags {
    /// Part of the key.
    pub identity: bool,
    /// Nested entities are embedded as full documents.
    pub full_save: bool,
    /// Nested entities are referenced by key and never cascaded.
    pub reference: bool,
    /// Backed by a unique secondary index.
    pub unique: bool,
    /// Backed by a non-unique secondary index.
    pub index: bool,
}

impl FieldTags {
    /// No tags.
    pub const NONE: FieldTags = FieldTags {
        identity: false,
        full_save: false,
        reference: false,
        unique: false,
        index: false,
    };

    /// Adds the identity tag.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Adds the full-save tag.
    #[must_use]
    pub const fn full_save(mut self) -> Self {
        self.full_save = true;
        self
    }

    /// Adds the reference tag.
    #[must_use]
    pub const fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    /// Adds the unique index tag.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Adds the regular index tag.
    #[must_use]
    pub const fn indexed(mut self) -> Self {
        self.index = true;
        self
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub(crate) name: &'static str,
    pub(crate) shape: Shape,
    pub(crate) nullable: bool,
    pub(crate) tags: FieldTags,
}

impl FieldDescriptor {
    /// Field name, also its document key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Whether the field may hold null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Policy tags.
    pub fn tags(&self) -> FieldTags {
        self.tags
    }

    /// Whether the field is part of the key.
    pub fn is_identity(&self) -> bool {
        self.tags.identity
    }

    /// Whether nested entities are embedded in full.
    pub fn is_full_save(&self) -> bool {
        self.tags.full_save
    }

    /// Whether nested entities are only referenced.
    pub fn is_reference(&self) -> bool {
        self.tags.reference
    }
}

/// Immutable metadata for one entity type, built once at registration.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub(crate) kind: String,
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) shallow: bool,
    pub(crate) ignore_null: bool,
    pub(crate) ignore_unknown_properties: bool,
    pub(crate) fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Logical collection name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Rust type id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether the type can only be embedded.
    pub fn is_shallow(&self) -> bool {
        self.shallow
    }

    /// Whether null fields are omitted when the type is stored.
    pub fn ignores_null(&self) -> bool {
        self.ignore_null
    }

    /// Whether unknown document fields are skipped on decode.
    pub fn ignores_unknown_properties(&self) -> bool {
        self.ignore_unknown_properties
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Identity fields in declaration order.
    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.tags.identity)
    }

    /// Returns true if the type declares at least one identity field.
    pub fn has_key(&self) -> bool {
        self.fields.iter().any(|f| f.tags.identity)
    }

    /// Fields backed by a unique secondary index.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.tags.unique)
    }

    /// Fields backed by a non-unique secondary index.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.tags.index && !f.tags.unique)
    }

    /// Flattened `{path: 1}` specification of the key.
    ///
    /// Identity fields holding an entity expand into that entity's own
    /// key paths, so `owner: Owner{id}` contributes `owner.id`.
    ///
    /// # Errors
    ///
    /// Returns the registration error of a nested entity type.
    pub fn key_index_spec(&self) -> CoreResult<Document> {
        let mut spec = Document::new();
        let mut path = HashSet::new();
        self.collect_key_paths(None, &mut spec, &mut path)?;
        Ok(spec)
    }

    fn collect_key_paths(
        &self,
        prefix: Option<&str>,
        spec: &mut Document,
        path: &mut HashSet<TypeId>,
    ) -> CoreResult<()> {
        if !path.insert(self.type_id) {
            return Ok(());
        }
        for field in self.identity_fields() {
            let name = match prefix {
                Some(p) => format!("{p}.{}", field.name),
                None => field.name.to_string(),
            };
            match &field.shape {
                Shape::Entity(entity) => {
                    let nested = entity.descriptor()?;
                    if nested.has_key() {
                        nested.collect_key_paths(Some(&name), spec, path)?;
                    } else {
                        spec.insert(name, 1);
                    }
                }
                _ => {
                    spec.insert(name, 1);
                }
            }
        }
        path.remove(&self.type_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry::describe;
    use crate::test_support::{Owner, Part, Tagged};
    use docmap_codec::Value;

    #[test]
    fn tags_chain() {
        let tags = FieldTags::NONE.identity().unique();
        assert!(tags.identity && tags.unique);
        assert!(!tags.full_save && !tags.reference && !tags.index);
    }

    #[test]
    fn key_spec_expands_nested_keys() {
        let desc = describe::<Tagged>().unwrap();
        let spec = desc.key_index_spec().unwrap();
        let paths: Vec<&str> = spec.keys().collect();
        assert_eq!(paths, vec!["label", "part.code"]);
        assert_eq!(spec.get("label"), Some(&Value::Integer(1)));
    }

    #[test]
    fn field_queries() {
        let desc = describe::<Owner>().unwrap();
        assert_eq!(desc.kind(), "Owner");
        assert!(desc.has_key());
        assert_eq!(desc.identity_fields().count(), 1);
        assert!(desc.field("main").unwrap().is_full_save());
        assert!(desc.field("linked").unwrap().is_reference());
        assert!(desc.field("missing").is_none());

        let part = describe::<Part>().unwrap();
        assert_eq!(part.unique_fields().count(), 0);
    }
}
