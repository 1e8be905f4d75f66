//! # docmap Testkit
//!
//! Test utilities for docmap.
//!
//! This crate provides:
//! - Fixture entities covering every field shape and tag
//! - A recording store decorator for asserting store traffic
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docmap_testkit::prelude::*;
//!
//! #[test]
//! fn saves_once() {
//!     let (ds, store) = recorded_datastore();
//!     ds.save(&mut sample_order("A-1"), false).unwrap();
//!     assert_eq!(store.calls_of("upsert"), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
