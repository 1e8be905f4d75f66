//! JSON presentation export.
//!
//! Date/times render as epoch milliseconds and the document identifier
//! never appears.

use docmap_codec::{Document, PresentedDocument, Value};

use crate::codec::encode::{encode_entity, encode_nested};
use crate::codec::policy::{EncodeContext, ExportPolicy};
use crate::entity::{AnyEntity, Entity};
use crate::error::CoreResult;

fn policy(omit_null: bool) -> ExportPolicy {
    if omit_null {
        ExportPolicy::JSON
    } else {
        ExportPolicy::JSON_WITH_NULL
    }
}

fn render(doc: &Document) -> CoreResult<String> {
    Ok(serde_json::to_string(&PresentedDocument(doc))?)
}

fn element(entity: &dyn AnyEntity, full_save: bool, omit_null: bool) -> CoreResult<Value> {
    let ctx = EncodeContext::new(policy(omit_null));
    if full_save {
        encode_nested(entity, &ctx.embedding())
    } else {
        encode_nested(entity, &ctx)
    }
}

/// Renders one entity as JSON.
///
/// # Errors
///
/// Returns an encode error of any field.
pub fn to_json(entity: &dyn AnyEntity, omit_null: bool) -> CoreResult<String> {
    to_json_with(entity, policy(omit_null))
}

/// Renders one entity as JSON under an explicit policy.
///
/// Storage policies are rendered in presentation mode.
///
/// # Errors
///
/// Returns an encode error of any field.
pub fn to_json_with(entity: &dyn AnyEntity, policy: ExportPolicy) -> CoreResult<String> {
    let policy = ExportPolicy {
        mode: crate::codec::ExportMode::Presentation,
        ..policy
    };
    render(&encode_entity(entity, &EncodeContext::new(policy))?)
}

/// Renders a string-keyed map of entities as a JSON object.
///
/// With `full_save` every entity is rendered in full, otherwise as its
/// key data.
///
/// # Errors
///
/// Returns an encode error of any entity.
pub fn map_to_json<'a, K, V, I>(entries: I, full_save: bool, omit_null: bool) -> CoreResult<String>
where
    K: AsRef<str> + 'a,
    V: Entity,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut doc = Document::new();
    for (name, entity) in entries {
        let name = name.as_ref();
        let value = element(entity, full_save, omit_null).map_err(|e| e.in_field(name))?;
        doc.insert(name, value);
    }
    render(&doc)
}

/// Renders a sequence of entities as `{"<name>": [...]}`.
///
/// # Errors
///
/// Returns an encode error of any entity.
pub fn collection_to_json<'a, V, I>(
    name: &str,
    items: I,
    full_save: bool,
    omit_null: bool,
) -> CoreResult<String>
where
    V: Entity,
    I: IntoIterator<Item = &'a V>,
{
    let values = items
        .into_iter()
        .map(|entity| element(entity, full_save, omit_null))
        .collect::<CoreResult<Vec<_>>>()?;
    let mut doc = Document::new();
    doc.insert(name, Value::Array(values));
    render(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Owner, Part};
    use std::collections::BTreeMap;

    #[test]
    fn entity_json_omits_identifier() {
        let mut part = Part::new("p", 2);
        part.header.set_document_id(docmap_codec::DocumentId::generate());
        assert_eq!(to_json(&part, true).unwrap(), r#"{"code":"p","qty":2}"#);
    }

    #[test]
    fn null_matrix() {
        let mut owner = Owner::new("o");
        owner.labels.insert("a".to_string(), None);

        let without = to_json(&owner, true).unwrap();
        assert!(!without.contains(r#""main""#));
        assert!(without.contains(r#""labels":{"a":null}"#));

        let with = to_json(&owner, false).unwrap();
        assert!(with.contains(r#""main":null"#));
    }

    #[test]
    fn map_and_collection_exports() {
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), Part::new("p", 1));

        assert_eq!(
            map_to_json(&map, true, true).unwrap(),
            r#"{"x":{"code":"p","qty":1}}"#
        );
        assert_eq!(map_to_json(&map, false, true).unwrap(), r#"{"x":{"code":"p"}}"#);

        let parts = vec![Part::new("a", 1), Part::new("b", 2)];
        assert_eq!(
            collection_to_json("parts", &parts, false, true).unwrap(),
            r#"{"parts":[{"code":"a"},{"code":"b"}]}"#
        );
    }
}
