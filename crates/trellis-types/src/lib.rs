//! Foundation types for the Trellis normalized cache.
//!
//! Every other Trellis crate builds on the vocabulary defined here:
//!
//! - [`DataId`]: the address of a record in the normalized graph. Server
//!   entities carry the id the server assigned; everything the client has to
//!   mint itself (the root, nodes without an `id` field) gets a deterministic
//!   `client:`-prefixed id.
//! - [`StorageKey`]: the key a field is stored under, with resolved argument
//!   values baked in so `user(id: 4)` and `user(id: 7)` occupy distinct slots.
//! - [`FieldValue`]: a stored field, either a scalar JSON value, a link to
//!   one record, or an ordered list of links.
//! - [`Record`]: one node of the graph, a flat map from storage key to field
//!   value. Records are immutable once published; updates go through
//!   [`Record::merge`], which returns the existing allocation untouched when
//!   nothing changed so callers can detect change by pointer identity.
//! - [`Variables`]: the argument values a query was executed with.

pub mod id;
pub mod key;
pub mod record;
pub mod value;
pub mod variables;

pub use id::{DataId, CLIENT_ID_PREFIX, ROOT_ID, ROOT_TYPE};
pub use key::StorageKey;
pub use record::{Record, RecordEntry, ID_FIELD, TYPENAME_FIELD};
pub use value::FieldValue;
pub use variables::Variables;
