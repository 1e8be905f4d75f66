//! Canonical CBOR encoder.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// CBOR tag for epoch-based date/time (RFC 8949 §3.4.2). The tagged item
/// holds epoch milliseconds, not seconds.
pub(crate) const TAG_EPOCH_MILLIS: u64 = 1;

/// CBOR tag for binary UUIDs.
pub(crate) const TAG_UUID: u64 = 37;

/// Encode a value to canonical CBOR bytes.
///
/// This function produces deterministic output following the canonical
/// CBOR rules in RFC 8949 Section 4.2.1:
/// - Document keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - Floats are always written as 64-bit IEEE 754
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns an error if the value contains NaN.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f)?,
            Value::Text(s) => self.encode_text(s),
            Value::Bytes(b) => self.encode_bytes(b),
            Value::DateTime(millis) => {
                self.encode_unsigned(6, TAG_EPOCH_MILLIS);
                self.encode_integer(*millis);
            }
            Value::Id(id) => {
                self.encode_unsigned(6, TAG_UUID);
                self.encode_bytes(id.as_bytes());
            }
            Value::Array(items) => {
                self.encode_unsigned(4, items.len() as u64);
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Document(doc) => self.encode_document(doc)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // -(n+1) is in [0, 2^63-1] for every negative i64
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    fn encode_float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_bytes(&mut self, bytes: &[u8]) {
        self.encode_unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    /// Encode a document as a canonical map.
    pub fn encode_document(&mut self, doc: &Document) -> CodecResult<()> {
        let mut encoded_pairs: Vec<(Vec<u8>, &Value)> = Vec::with_capacity(doc.len());
        for (key, value) in doc.iter() {
            let mut key_encoder = CanonicalEncoder::with_capacity(key.len() + 1);
            key_encoder.encode_text(key);
            encoded_pairs.push((key_encoder.into_bytes(), value));
        }

        encoded_pairs.sort_by(|a, b| match a.0.len().cmp(&b.0.len()) {
            std::cmp::Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });

        self.encode_unsigned(5, doc.len() as u64);
        for (encoded_key, value) in encoded_pairs {
            self.buffer.extend_from_slice(&encoded_key);
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentId;

    #[test]
    fn encode_simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn integers_use_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(24)).unwrap(),
            vec![0x18, 24]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(-100)).unwrap(),
            vec![0x38, 99]
        );
    }

    #[test]
    fn floats_are_double_precision() {
        assert_eq!(
            to_canonical_cbor(&Value::Float(1.5)).unwrap(),
            vec![0xfb, 0x3f, 0xf8, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Float(f64::NAN)),
            Err(CodecError::NaNForbidden)
        );
    }

    #[test]
    fn datetime_and_id_are_tagged() {
        assert_eq!(
            to_canonical_cbor(&Value::DateTime(1000)).unwrap(),
            vec![0xc1, 0x19, 0x03, 0xe8]
        );

        let id = DocumentId::from_bytes([7; 16]);
        let bytes = to_canonical_cbor(&Value::Id(id)).unwrap();
        assert_eq!(&bytes[..3], &[0xd8, 37, 0x50]);
        assert_eq!(&bytes[3..], &[7; 16]);
    }

    #[test]
    fn document_keys_sorted_length_first() {
        let doc: Document = [("bb", 2), ("a", 1)].into_iter().collect();
        let bytes = to_canonical_cbor(&Value::Document(doc)).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn insertion_order_does_not_change_bytes() {
        let first: Document = [("z", 1), ("a", 2)].into_iter().collect();
        let second: Document = [("a", 2), ("z", 1)].into_iter().collect();
        assert_eq!(
            to_canonical_cbor(&Value::Document(first)).unwrap(),
            to_canonical_cbor(&Value::Document(second)).unwrap()
        );
    }
}
