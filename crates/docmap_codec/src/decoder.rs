//! Canonical CBOR decoder.

use crate::document::Document;
use crate::encoder::{TAG_EPOCH_MILLIS, TAG_UUID};
use crate::error::{CodecError, CodecResult};
use crate::id::DocumentId;
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not canonical CBOR, use an
/// unsupported tag, or carry trailing data.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining().len(),
        });
    }
    Ok(value)
}

/// Decode a document from CBOR bytes.
///
/// # Errors
///
/// Same as [`from_cbor`], plus [`CodecError::NotADocument`] when the
/// top-level item is not a map.
pub fn document_from_cbor(bytes: &[u8]) -> CodecResult<Document> {
    match from_cbor(bytes)? {
        Value::Document(doc) => Ok(doc),
        other => Err(CodecError::NotADocument {
            found: other.type_name(),
        }),
    }
}

/// A canonical CBOR decoder.
///
/// This decoder validates that input follows canonical CBOR rules
/// and rejects forbidden constructs.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 | 1 => self.decode_integer(major_type, additional_info).map(Value::Integer),
            2 => self.decode_bytes(additional_info).map(|b| Value::Bytes(b.to_vec())),
            3 => self.decode_text(additional_info),
            4 => self.decode_array(additional_info),
            5 => self.decode_document(additional_info),
            6 => self.decode_tagged(additional_info),
            7 => self.decode_simple(additional_info),
            _ => Err(CodecError::invalid_structure("invalid major type")),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self.data.get(self.pos..end).ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let value = u64::from_be_bytes(raw);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_integer(&mut self, major_type: u8, additional_info: u8) -> CodecResult<i64> {
        let raw = self.decode_unsigned(additional_info)?;
        let magnitude = i64::try_from(raw)
            .map_err(|_| CodecError::invalid_structure("integer outside the i64 range"))?;
        Ok(if major_type == 0 { magnitude } else { -magnitude - 1 })
    }

    fn decode_length(&mut self, additional_info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed,
        })
    }

    fn decode_bytes(&mut self, additional_info: u8) -> CodecResult<&'a [u8]> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        self.read_bytes(len)
    }

    fn decode_text_str(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<Value> {
        self.decode_text_str(additional_info).map(Value::Text)
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_document(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut doc = Document::with_capacity(len.min(1024));
        let data: &'a [u8] = self.data;
        let mut prev_key_bytes: Option<&'a [u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let initial = self.read_byte()?;
            if initial >> 5 != 3 {
                return Err(CodecError::invalid_structure("document keys must be text"));
            }
            let key = self.decode_text_str(initial & 0x1f)?;
            let key_bytes = &data[key_start..self.pos];

            if let Some(prev) = prev_key_bytes {
                if compare_cbor_bytes(prev, key_bytes) != std::cmp::Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not in sorted order",
                    ));
                }
            }
            prev_key_bytes = Some(key_bytes);

            let value = self.decode()?;
            doc.insert(key, value);
        }

        Ok(Value::Document(doc))
    }

    fn decode_tagged(&mut self, additional_info: u8) -> CodecResult<Value> {
        match self.decode_unsigned(additional_info)? {
            TAG_EPOCH_MILLIS => {
                let initial = self.read_byte()?;
                let major_type = initial >> 5;
                if major_type > 1 {
                    return Err(CodecError::invalid_structure("date/time tag must wrap an integer"));
                }
                self.decode_integer(major_type, initial & 0x1f)
                    .map(Value::DateTime)
            }
            TAG_UUID => {
                let initial = self.read_byte()?;
                if initial >> 5 != 2 {
                    return Err(CodecError::invalid_structure("uuid tag must wrap a byte string"));
                }
                let bytes = self.decode_bytes(initial & 0x1f)?;
                DocumentId::from_slice(bytes)
                    .map(Value::Id)
                    .ok_or_else(|| CodecError::invalid_structure("uuid must be 16 bytes"))
            }
            other => Err(CodecError::unsupported_type(format!("tag {other}"))),
        }
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                let value = f64::from_bits(u64::from_be_bytes(raw));
                if value.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(value))
            }
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must be double precision",
            )),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Length-first, then bytewise.
fn compare_cbor_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x17]).unwrap(), Value::Integer(23));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x00]).unwrap(), Value::Integer(256));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_tagged_values() {
        assert_eq!(
            from_cbor(&[0xc1, 0x19, 0x03, 0xe8]).unwrap(),
            Value::DateTime(1000)
        );
        let mut id_bytes = vec![0xd8, 37, 0x50];
        id_bytes.extend_from_slice(&[9; 16]);
        assert_eq!(
            from_cbor(&id_bytes).unwrap(),
            Value::Id(DocumentId::from_bytes([9; 16]))
        );
    }

    #[test]
    fn decode_document_keeps_keys() {
        let doc = document_from_cbor(&[0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::Integer(1)));
        assert_eq!(doc.get("bb"), Some(&Value::Integer(2)));
    }

    #[test]
    fn reject_unsorted_document_keys() {
        assert!(matches!(
            from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_non_text_keys() {
        assert!(matches!(
            from_cbor(&[0xa1, 0x01, 0x01]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_short_floats_and_nan() {
        assert!(matches!(
            from_cbor(&[0xf9, 0x00, 0x00]),
            Err(CodecError::InvalidStructure { .. })
        ));
        let nan = f64::NAN.to_bits().to_be_bytes();
        let mut bytes = vec![0xfb];
        bytes.extend_from_slice(&nan);
        assert_eq!(from_cbor(&bytes), Err(CodecError::NaNForbidden));
    }

    #[test]
    fn reject_indefinite_length() {
        assert!(matches!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
        assert!(matches!(
            from_cbor(&[0xbf, 0x61, b'a', 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        ));
    }

    #[test]
    fn reject_non_shortest_encoding() {
        assert!(matches!(
            from_cbor(&[0x18, 23]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_unknown_tag_and_trailing_bytes() {
        assert!(matches!(
            from_cbor(&[0xc2, 0x41, 0x01]),
            Err(CodecError::UnsupportedType { .. })
        ));
        assert_eq!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn top_level_must_be_document() {
        assert_eq!(
            document_from_cbor(&[0x01]),
            Err(CodecError::NotADocument { found: "integer" })
        );
    }

    #[test]
    fn unexpected_eof() {
        assert!(matches!(from_cbor(&[]), Err(CodecError::UnexpectedEof)));
        assert!(matches!(from_cbor(&[0x19, 0x01]), Err(CodecError::UnexpectedEof)));
    }
}
