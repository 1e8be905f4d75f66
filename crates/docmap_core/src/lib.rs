//! # docmap Core
//!
//! Object/document mapping engine for docmap.
//!
//! This crate provides:
//! - Type descriptors built once per entity type from a declarative [`Schema`]
//! - [`Key`] derivation from identity fields, with nested substitution
//! - Entity to document encoding under an [`ExportPolicy`]
//! - Cascading save, load and delete that never cross reference fields
//! - Filter, projection and sort construction with field path validation
//! - Typed cursors and change watchers
//!
//! Persistence goes through a [`docmap_store::DocumentStore`]; the
//! [`Datastore`] facade binds one store to the engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docmap_core::prelude::*;
//!
//! let ds = Datastore::memory();
//! let mut order = Order::new("A-1");
//! ds.save(&mut order, true)?;
//!
//! let open = ds
//!     .query::<Order>()?
//!     .filter(Filter::eq("status", Status::Open)?)?
//!     .sort("number", SortDirection::Asc)
//!     .execute(&ds)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod config;
mod cursor;
mod datastore;
mod entity;
mod error;
mod field;
mod filter;
mod key;
mod ops;
mod query;
mod schema;
mod traversal;
mod watch;

#[cfg(test)]
mod test_support;

pub use codec::{
    collection_to_json, decode, decode_into, encode_entity, map_to_json, to_json, to_json_with,
    EncodeContext, ExportMode, ExportPolicy,
};
pub use config::{
    Config, DEFAULT_KEY_INDEX_NAME, DEFAULT_REGULAR_INDEX_PREFIX, DEFAULT_UNIQUE_INDEX_PREFIX,
};
pub use cursor::Cursor;
pub use datastore::{CollectionHandle, Datastore};
pub use entity::{AnyEntity, Entity, EntityHeader};
pub use error::{CoreError, CoreResult};
pub use field::{decode_enum, EntityVisitor, EnumField, FieldType, MapKey, Slot};
pub use filter::{validate_path, Combinator, Filter, FilterOperator, Operand};
pub use key::Key;
pub use ops::EntityExt;
pub use query::{Query, SortDirection};
pub use schema::registry::{describe, is_registered, register, registered_kind};
pub use schema::{EntityType, FieldDescriptor, FieldTags, ScalarKind, Schema, Shape, TypeDescriptor};
pub use watch::{ChangeWatcher, WatchMode};

pub use docmap_codec::{Document, DocumentId, Value};
pub use docmap_store::WriteDurability;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Combinator, Datastore, Document, DocumentId, Entity, EntityExt, EntityHeader, EnumField,
        Filter, FilterOperator, Key, Query, Schema, Slot, SortDirection, Value, WatchMode,
        WriteDurability,
    };
}
