//! # docmap Codec
//!
//! Document model and canonical CBOR encoding for docmap.
//!
//! Every mapped object is converted to a [`Document`] before it reaches a
//! store. This crate defines that model and a deterministic binary
//! encoding for it:
//! - Identical documents produce identical bytes regardless of field
//!   insertion order
//! - Integers use the shortest encoding
//! - Floats are always 64-bit, NaN is rejected
//! - Date/times are tag 1 over epoch milliseconds
//! - Document identifiers are tag 37 over 16 bytes
//! - No indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use docmap_codec::{document_from_cbor, Document, Encode, Value};
//!
//! let mut doc = Document::new();
//! doc.insert("name", "Alice");
//! doc.insert("age", 30);
//!
//! let bytes = doc.encode().unwrap();
//! let decoded = document_from_cbor(&bytes).unwrap();
//! assert_eq!(decoded.get("age"), Some(&Value::Integer(30)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod id;
mod present;
mod value;

pub use decoder::{document_from_cbor, from_cbor, CanonicalDecoder};
pub use document::Document;
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use id::DocumentId;
pub use present::{Presented, PresentedDocument};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

impl Encode for Document {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut encoder = CanonicalEncoder::new();
        encoder.encode_document(self)?;
        Ok(encoder.into_bytes())
    }
}

impl Decode for Document {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        document_from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e12f64..1.0e12).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::Text),
            any::<i64>().prop_map(Value::DateTime),
            any::<[u8; 16]>().prop_map(|b| Value::Id(DocumentId::from_bytes(b))),
        ]
    }

    fn fields() -> impl Strategy<Value = Vec<(String, Value)>> {
        prop::collection::btree_map("[a-z]{1,6}", leaf(), 0..6)
            .prop_map(|m| m.into_iter().collect())
    }

    #[test]
    fn nested_document_survives_encoding() {
        let mut inner = Document::new();
        inner.insert("city", "Oslo");
        let mut doc = Document::new();
        doc.insert("name", "Alice");
        doc.insert("address", inner);
        doc.insert("scores", vec![1.5f64, 2.0]);

        let bytes = doc.encode().unwrap();
        let decoded = Document::decode(&bytes).unwrap();
        assert_eq!(decoded.get_path("address.city"), Some(&Value::from("Oslo")));
        assert_eq!(
            decoded.get("scores"),
            Some(&Value::Array(vec![Value::Float(1.5), Value::Float(2.0)]))
        );
    }

    #[test]
    fn canonical_bytes_readable_by_ciborium() {
        let doc: Document = [("n", Value::Integer(-7)), ("s", Value::from("hi"))]
            .into_iter()
            .collect();
        let bytes = doc.encode().unwrap();

        let parsed: ciborium::value::Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        let map = parsed.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].0.as_text(), Some("n"));
    }

    proptest! {
        #[test]
        fn field_order_never_changes_bytes(pairs in fields()) {
            let forward: Document = pairs.iter().cloned().collect();
            let backward: Document = pairs.iter().rev().cloned().collect();
            prop_assert_eq!(forward.encode().unwrap(), backward.encode().unwrap());
        }
    }
}
