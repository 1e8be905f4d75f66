//! Document to entity decoding.

use docmap_codec::{Document, Value};
use docmap_store::ID_FIELD;

use crate::entity::{AnyEntity, Entity};
use crate::error::{CoreError, CoreResult};

/// Decodes `doc` into `entity`.
///
/// Declared fields missing from the document keep their current value,
/// so projected documents hydrate partially. Document fields the type
/// does not declare fail the decode unless the type ignores unknown
/// properties. The memoized key is reset.
///
/// # Errors
///
/// Returns [`CoreError::UnknownProperty`], or a decode error wrapped
/// with the failing field path.
pub fn decode_into(entity: &mut dyn AnyEntity, doc: &Document) -> CoreResult<()> {
    let desc = entity.descriptor()?;
    entity.entity_header_mut().reset_key();

    for (name, value) in doc.iter() {
        if name == ID_FIELD {
            if let Value::Id(id) = value {
                entity.entity_header_mut().set_document_id(*id);
            }
            continue;
        }
        let Some(field) = desc.field(name) else {
            if desc.ignores_unknown_properties() {
                continue;
            }
            return Err(CoreError::UnknownProperty {
                kind: desc.kind().to_string(),
                field: name.to_string(),
            });
        };
        let slot = entity.slot_mut(field.name()).ok_or_else(|| CoreError::MissingSlot {
            kind: desc.kind().to_string(),
            field: field.name().to_string(),
        })?;
        slot.decode_value(value).map_err(|e| e.in_field(name))?;
    }
    Ok(())
}

/// Decodes `doc` into a fresh `T`.
///
/// # Errors
///
/// Same as [`decode_into`].
pub fn decode<T: Entity>(doc: &Document) -> CoreResult<T> {
    let mut entity = T::default();
    decode_into(&mut entity, doc)?;
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_entity, EncodeContext, ExportPolicy};
    use crate::test_support::{Loose, Owner, Part};
    use docmap_codec::DocumentId;

    #[test]
    fn reference_payload_decodes_to_identity_only_child() {
        let mut owner = Owner::new("o");
        owner.linked = Some(Part::new("l", 7));
        let doc = encode_entity(&owner, &EncodeContext::new(ExportPolicy::STORAGE)).unwrap();

        let back: Owner = decode(&doc).unwrap();
        let linked = back.linked.unwrap();
        assert_eq!(linked.code, "l");
        assert_eq!(linked.qty, 0);
    }

    #[test]
    fn missing_fields_keep_defaults() {
        let doc: Document = [("code", "c")].into_iter().collect();
        let part: Part = decode(&doc).unwrap();
        assert_eq!(part.code, "c");
        assert_eq!(part.qty, 0);
    }

    #[test]
    fn unknown_fields_follow_type_policy() {
        let doc: Document = [("code", Value::from("c")), ("extra", Value::Integer(1))]
            .into_iter()
            .collect();
        let err = decode::<Part>(&doc).unwrap_err();
        assert!(matches!(err, CoreError::UnknownProperty { ref field, .. } if field == "extra"));

        let doc: Document = [("name", Value::from("n")), ("extra", Value::Integer(1))]
            .into_iter()
            .collect();
        let loose: Loose = decode(&doc).unwrap();
        assert_eq!(loose.name, "n");
    }

    #[test]
    fn identifier_lands_in_header() {
        let id = DocumentId::generate();
        let doc: Document = [(ID_FIELD, Value::Id(id)), ("code", Value::from("c"))]
            .into_iter()
            .collect();
        let part: Part = decode(&doc).unwrap();
        assert_eq!(part.header.document_id(), Some(id));
    }

    #[test]
    fn type_errors_name_the_field() {
        let doc: Document = [("code", Value::from("c")), ("qty", Value::from("many"))]
            .into_iter()
            .collect();
        let err = decode::<Part>(&doc).unwrap_err();
        assert!(matches!(err, CoreError::Field { ref field, .. } if field == "qty"));
        assert!(err.is_decode());
    }
}
