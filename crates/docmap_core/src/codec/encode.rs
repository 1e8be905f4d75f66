//! Entity to document encoding.

use docmap_codec::{Document, Value};
use docmap_store::ID_FIELD;

use crate::codec::policy::EncodeContext;
use crate::entity::AnyEntity;
use crate::error::{CoreError, CoreResult};

/// Encodes `entity` under `ctx`.
///
/// Fields are written in declaration order. A null field is dropped when
/// the policy omits nulls; null entries inside containers are always
/// written. The document identifier leads the document in storage mode
/// at the root.
///
/// # Errors
///
/// Returns an error if the type is not registrable or a field value
/// cannot be represented.
pub fn encode_entity(entity: &dyn AnyEntity, ctx: &EncodeContext) -> CoreResult<Document> {
    let desc = entity.descriptor()?;
    let mut doc = Document::with_capacity(desc.fields().len() + 1);

    if ctx.policy().includes_id() && ctx.depth() == 0 {
        if let Some(id) = entity.entity_header().document_id() {
            doc.insert(ID_FIELD, id);
        }
    }

    for field in desc.fields() {
        let slot = entity.slot(field.name()).ok_or_else(|| CoreError::MissingSlot {
            kind: desc.kind().to_string(),
            field: field.name().to_string(),
        })?;
        if slot.is_null() {
            if !ctx.policy().omit_null {
                doc.insert(field.name(), Value::Null);
            }
            continue;
        }
        let value = slot
            .encode_value(&ctx.for_field(field))
            .map_err(|e| e.in_field(field.name()))?;
        doc.insert(field.name(), value);
    }
    Ok(doc)
}

/// Encodes a nested entity met in `ctx`: its full document when the
/// context embeds, its key data otherwise.
pub(crate) fn encode_nested(entity: &dyn AnyEntity, ctx: &EncodeContext) -> CoreResult<Value> {
    if ctx.embeds() {
        Ok(Value::Document(encode_entity(entity, &ctx.nested())?))
    } else {
        Ok(Value::Document(crate::Key::of(entity)?.data().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::policy::ExportPolicy;
    use crate::test_support::{Owner, Part};
    use docmap_codec::DocumentId;

    fn owner() -> Owner {
        let mut owner = Owner::new("o1");
        owner.main = Some(Part::new("m", 1));
        owner.linked = Some(Part::new("l", 2));
        owner.plain = Some(Part::new("p", 3));
        owner.parts = vec![Part::new("a", 4)];
        owner
    }

    #[test]
    fn tags_decide_embedding() {
        let doc = encode_entity(&owner(), &EncodeContext::new(ExportPolicy::STORAGE)).unwrap();

        let main = doc.get("main").and_then(Value::as_document).unwrap();
        assert_eq!(main.get("qty"), Some(&Value::Integer(1)));

        let linked = doc.get("linked").and_then(Value::as_document).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked.get("code"), Some(&Value::from("l")));

        let plain = doc.get("plain").and_then(Value::as_document).unwrap();
        assert!(plain.get("qty").is_none());

        let parts = doc.get("parts").and_then(Value::as_array).unwrap();
        assert_eq!(parts[0].get("qty"), Some(&Value::Integer(4)));
    }

    #[test]
    fn embed_depth_overrides_key_only() {
        let doc = encode_entity(&owner(), &EncodeContext::new(ExportPolicy::JSON_INNER_1)).unwrap();
        let plain = doc.get("plain").and_then(Value::as_document).unwrap();
        assert_eq!(plain.get("qty"), Some(&Value::Integer(3)));

        let linked = doc.get("linked").and_then(Value::as_document).unwrap();
        assert!(linked.get("qty").is_none());
    }

    #[test]
    fn null_fields_follow_policy() {
        let bare = Owner::new("o1");
        let kept = encode_entity(&bare, &EncodeContext::new(ExportPolicy::STORAGE)).unwrap();
        assert_eq!(kept.get("main"), Some(&Value::Null));

        let dropped =
            encode_entity(&bare, &EncodeContext::new(ExportPolicy::STORAGE_IGNORE_NULL)).unwrap();
        assert!(!dropped.contains_key("main"));
        assert!(dropped.contains_key("name"));
    }

    #[test]
    fn identifier_only_in_storage() {
        let mut part = Part::new("p", 1);
        let id = DocumentId::generate();
        part.header.set_document_id(id);

        let stored = encode_entity(&part, &EncodeContext::new(ExportPolicy::STORAGE)).unwrap();
        assert_eq!(stored.keys().next(), Some(ID_FIELD));
        assert_eq!(stored.get(ID_FIELD), Some(&Value::Id(id)));

        let shown = encode_entity(&part, &EncodeContext::new(ExportPolicy::JSON)).unwrap();
        assert!(!shown.contains_key(ID_FIELD));
    }
}
