//! # Datatypes Engine
//!
//! Data adapters for record and table shaped JSON, with copy-on-write
//! wrapping and format resolution for de-duplicated wire payloads.
//!
//! ## Design Principles
//!
//! - **No IO**: adapters only transform in-memory values
//! - **Shared data is read-only**: raw data travels as `Arc<Value>` and is
//!   only ever written through a uniquely held copy
//! - **Synchronous**: nothing here blocks, suspends or locks
//!
//! ## Core Concepts
//!
//! ### Adapters
//!
//! An [`Adapter`] produces views over raw data: a [`TableAdapter`] for an
//! ordered set of records and a [`RecordAdapter`] for one record.
//! - [`JsonAdapter`] - arrays of objects and plain objects
//! - [`SbisAdapter`] - the positional `{d, s, f}` wire format
//!
//! ### Copy-on-write
//!
//! [`CowAdapter`] wraps any adapter. Its [`CowTable`] and [`CowRecord`]
//! views read the shared data until the first mutating call, then make one
//! private copy and work on it from then on. Views that implement
//! [`Cloneable`] are cloned; anything else has its data duplicated.
//!
//! ### Format links
//!
//! Wire payloads define each nested format inline once and refer to it by id
//! afterwards. [`FormatFinder`] scans a payload, caches formats by id and
//! resolves links.
//!
//! ## Quick Start
//!
//! ```rust
//! use datatypes_engine::{CowAdapter, JsonAdapter, Adapter, TableAdapter};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let shared = Arc::new(json!([{"id": 1, "name": "Alice"}]));
//! let adapter = CowAdapter::new(Arc::new(JsonAdapter::new()));
//!
//! let mut table = adapter.for_table(Arc::clone(&shared)).unwrap();
//! assert!(std::ptr::eq(table.data(), &*shared));
//!
//! table.remove(0).unwrap();
//! assert_eq!(table.count(), 0);
//! assert_eq!(shared.as_array().unwrap().len(), 1);
//! ```
//!
//! Resolving a linked format:
//!
//! ```rust
//! use datatypes_engine::FormatFinder;
//! use serde_json::json;
//!
//! let payload = json!({
//!     "f": 0,
//!     "s": [{"n": "Items", "t": {"n": "Array", "t": "Object"}}],
//!     "d": [[
//!         {"f": 1, "s": [{"n": "Name", "t": "String"}], "d": ["a"]},
//!         {"f": 1, "d": ["b"]}
//!     ]]
//! });
//!
//! let mut finder = FormatFinder::new(&payload);
//! assert_eq!(finder.format(Some(1)).unwrap()[0].name, "Name");
//! assert!(finder.format(Some(2)).is_err());
//! ```

pub mod adapter;
pub mod cow;
pub mod error;
pub mod finder;
pub mod format;
pub mod json;
pub mod sbis;

// Re-export main types at crate root
pub use adapter::{
    from_envelope, from_json, Adapter, Cloneable, Envelope, EnvelopeState, RecordAdapter,
    TableAdapter,
};
pub use cow::{CowAdapter, CowRecord, CowTable};
pub use error::Error;
pub use finder::{FormatFinder, ROOT_FORMAT_ID};
pub use format::{FieldDescriptor, FieldFormat, FieldKind, FieldType, Format, SharedFormat};
pub use json::{JsonAdapter, JsonRecord, JsonTable};
pub use sbis::{SbisAdapter, SbisRecord, SbisTable};

/// Type aliases for clarity
pub type RawData = std::sync::Arc<serde_json::Value>;
pub type FieldName = String;
pub type FormatId = u32;
