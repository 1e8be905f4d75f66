//! Presentation (JSON) view of values.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::document::Document;
use crate::value::Value;

/// Serializes a [`Value`] for human-facing output.
///
/// Fields keep document order. Date/times are written as epoch
/// milliseconds, document identifiers are written as `null`, and byte
/// strings as arrays of numbers.
pub struct Presented<'a>(pub &'a Value);

/// Serializes a [`Document`] with the same rules as [`Presented`].
pub struct PresentedDocument<'a>(pub &'a Document);

impl Serialize for Presented<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null | Value::Id(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) | Value::DateTime(n) => serializer.serialize_i64(*n),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_unit(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Bytes(bytes) => {
                let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
                for b in bytes {
                    seq.serialize_element(b)?;
                }
                seq.end()
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Presented(item))?;
                }
                seq.end()
            }
            Value::Document(doc) => PresentedDocument(doc).serialize(serializer),
        }
    }
}

impl Serialize for PresentedDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0.iter() {
            map.serialize_entry(key, &Presented(value))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentId;

    #[test]
    fn presentation_rules() {
        let mut doc = Document::new();
        doc.insert("_id", DocumentId::generate());
        doc.insert("when", Value::DateTime(1_500));
        doc.insert("name", "x");
        doc.insert("ratio", 0.5);
        doc.insert("tags", vec!["a", "b"]);

        let json = serde_json::to_string(&PresentedDocument(&doc)).unwrap();
        assert_eq!(
            json,
            r#"{"_id":null,"when":1500,"name":"x","ratio":0.5,"tags":["a","b"]}"#
        );
    }
}
