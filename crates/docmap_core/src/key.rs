//! Entity identity.
//!
//! A [`Key`] is derived from an entity's identity fields in declaration
//! order. Identity fields holding another entity contribute that
//! entity's own key data rather than its full document. Keys compare
//! and hash by kind plus the flattened field map, independent of field
//! insertion order.

use std::fmt;
use std::hash::{Hash, Hasher};

use docmap_codec::{Document, Encode, PresentedDocument, Value};

use crate::codec::EncodeContext;
use crate::entity::AnyEntity;
use crate::error::{CoreError, CoreResult};
use crate::filter::Filter;

/// Identity of one entity.
#[derive(Debug, Clone)]
pub struct Key {
    kind: String,
    data: Document,
    filter: Document,
    canonical: Vec<u8>,
}

impl Key {
    /// Returns the key of `entity`, computing and memoizing it on first
    /// use.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not registrable or an identity
    /// field cannot be encoded.
    pub fn of(entity: &dyn AnyEntity) -> CoreResult<Key> {
        if let Some(key) = entity.entity_header().cached_key() {
            return Ok(key.clone());
        }
        let key = Self::derive(entity)?;
        entity.entity_header().remember_key(key.clone());
        Ok(key)
    }

    fn derive(entity: &dyn AnyEntity) -> CoreResult<Key> {
        let desc = entity.descriptor()?;
        let ctx = EncodeContext::identity();
        let mut data = Document::new();
        for field in desc.identity_fields() {
            let slot = entity.slot(field.name()).ok_or_else(|| CoreError::MissingSlot {
                kind: desc.kind().to_string(),
                field: field.name().to_string(),
            })?;
            let value = if slot.is_null() {
                Value::Null
            } else {
                slot.encode_value(&ctx)
                    .map_err(|e| e.in_field(field.name()))?
            };
            data.insert(field.name(), value);
        }
        Self::from_parts(desc.kind(), data)
    }

    /// Builds a key from kind and identity data.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the data holds a NaN.
    pub fn from_parts(kind: impl Into<String>, data: Document) -> CoreResult<Key> {
        let kind = kind.into();
        let filter = data.flattened();
        let mut canonical = Document::new();
        canonical.insert("kind", kind.as_str());
        canonical.insert("data", filter.clone());
        let canonical = canonical.encode()?;
        Ok(Self {
            kind,
            data,
            filter,
            canonical,
        })
    }

    /// Kind of the keyed entity.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Identity fields with nested keys as sub-documents.
    pub fn data(&self) -> &Document {
        &self.data
    }

    /// Identity fields as flattened dotted paths, for store equality
    /// filters.
    pub fn filter_document(&self) -> &Document {
        &self.filter
    }

    /// Returns true if the type declares no identity fields.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Equality filter on every flattened identity path.
    pub fn to_filter(&self) -> Filter {
        let mut leaves: Vec<Filter> = self
            .filter
            .iter()
            .map(|(path, value)| Filter::equal_value(path, value.clone()))
            .collect();
        if leaves.len() == 1 {
            leaves.remove(0)
        } else {
            Filter::and(leaves)
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&PresentedDocument(&self.data)).map_err(|_| fmt::Error)?;
        write!(f, "{}{}", self.kind, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Part, Tagged};
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;
    use std::hash::{Hash, Hasher};

    fn hash_of(key: &Key) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    proptest! {
        #[test]
        fn keys_ignore_non_identity_fields(
            code in "[a-z0-9]{1,8}",
            a in any::<i32>(),
            b in any::<i32>(),
        ) {
            let left = Key::of(&Part::new(&code, a)).unwrap();
            let right = Key::of(&Part::new(&code, b)).unwrap();
            prop_assert_eq!(hash_of(&left), hash_of(&right));
            prop_assert_eq!(left.to_string(), right.to_string());
            prop_assert_eq!(left, right);
        }

        #[test]
        fn key_data_order_is_irrelevant(
            pairs in prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..6),
        ) {
            let forward: Document = pairs.iter().map(|(k, v)| (k.as_str(), *v)).collect();
            let backward: Document = pairs.iter().rev().map(|(k, v)| (k.as_str(), *v)).collect();
            let forward = Key::from_parts("K", forward).unwrap();
            let backward = Key::from_parts("K", backward).unwrap();
            prop_assert_eq!(hash_of(&forward), hash_of(&backward));
            prop_assert_eq!(forward, backward);
        }
    }

    #[test]
    fn equal_identity_means_equal_key() {
        let a = Part::new("p1", 1);
        let b = Part::new("p1", 99);
        let c = Part::new("p2", 1);

        assert_eq!(Key::of(&a).unwrap(), Key::of(&b).unwrap());
        assert_ne!(Key::of(&a).unwrap(), Key::of(&c).unwrap());

        let set: HashSet<Key> = [&a, &b, &c].iter().map(|p| Key::of(*p).unwrap()).collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn nested_identity_uses_nested_key() {
        let tagged = Tagged::new("t", Part::new("p1", 5));
        let key = Key::of(&tagged).unwrap();

        let part = key.data().get("part").and_then(Value::as_document).unwrap();
        assert_eq!(part.get("code"), Some(&Value::from("p1")));
        assert!(part.get("qty").is_none());

        let paths: Vec<&str> = key.filter_document().keys().collect();
        assert_eq!(paths, vec!["label", "part.code"]);
    }

    #[test]
    fn field_order_does_not_matter() {
        let forward: Document = [("a", 1), ("b", 2)].into_iter().collect();
        let backward: Document = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(
            Key::from_parts("K", forward).unwrap(),
            Key::from_parts("K", backward).unwrap()
        );
        assert_ne!(
            Key::from_parts("K", Document::new()).unwrap(),
            Key::from_parts("J", Document::new()).unwrap()
        );
    }

    #[test]
    fn key_is_memoized() {
        let mut part = Part::new("p1", 1);
        let first = Key::of(&part).unwrap();
        part.code = "changed".to_string();
        assert_eq!(Key::of(&part).unwrap(), first);

        part.header.reset_key();
        assert_ne!(Key::of(&part).unwrap(), first);
    }

    #[test]
    fn display_and_filter() {
        let key = Key::of(&Part::new("p1", 1)).unwrap();
        assert_eq!(key.to_string(), r#"Part{"code":"p1"}"#);
        assert_eq!(
            key.to_filter().to_document().get("code"),
            Some(&Value::Document([("$eq", "p1")].into_iter().collect()))
        );
    }
}
