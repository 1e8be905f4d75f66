//! # docmap Store
//!
//! Document store abstraction for docmap.
//!
//! This crate defines the collaborator every mapped operation ends up
//! calling. Stores work on plain [`docmap_codec::Document`]s grouped into
//! named collections; they know nothing about mapped types.
//!
//! ## Design Principles
//!
//! - Stores own persistence, filtering, indexing and change notification
//! - Filters, projections and sorts are documents in the usual
//!   `{path: {$op: operand}}` form
//! - Must be `Send + Sync` for concurrent access
//! - The mapping layer owns all type interpretation
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - For testing and embedding
//!
//! ## Example
//!
//! ```rust
//! use docmap_codec::Document;
//! use docmap_store::{DocumentStore, FindRequest, MemoryStore, WriteDurability};
//!
//! let store = MemoryStore::new();
//! let mut doc = Document::new();
//! doc.insert("name", "alice");
//! store.insert("users", doc, WriteDurability::default()).unwrap();
//!
//! let mut cursor = store.find("users", &FindRequest::default()).unwrap();
//! assert!(cursor.next_document().unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod change;
mod error;
mod matcher;
mod memory;

pub use backend::{
    ChangeStream, DocumentCursor, DocumentStore, FindRequest, IndexInfo, UpsertOutcome,
    WriteDurability, ID_FIELD, ID_INDEX_NAME,
};
pub use change::{ChangeEvent, ChangeFeed, FeedStream, OperationType};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
