//! Entity to document codec.
//!
//! Encoding walks the type descriptor in declaration order and asks each
//! field's [`Slot`](crate::Slot) for its value under an
//! [`EncodeContext`]. Whether a nested entity becomes its full document
//! or its key data is decided by the field tags and the
//! [`ExportPolicy`] threaded through the context.

mod decode;
mod encode;
mod json;
mod policy;

pub use decode::{decode, decode_into};
pub use encode::encode_entity;
pub(crate) use encode::encode_nested;
pub use json::{collection_to_json, map_to_json, to_json, to_json_with};
pub use policy::{EncodeContext, ExportMode, ExportPolicy};
