//! Turning hierarchical response payloads into normalized records.
//!
//! [`normalize`] walks a selection tree and its JSON payload side by side
//! and writes flat records into a mutable sink. It never touches the live
//! store: the publish path hands it a scratch sink and merges the result in
//! only after the whole payload normalized cleanly, which is what makes a
//! malformed payload an all-or-nothing failure.
//!
//! Child records are addressed by the id the payload carries when there is
//! one, and otherwise by a deterministic client id derived from the parent
//! and the field that reached them, so normalizing the same payload twice
//! converges on the same records.

pub mod error;
pub mod normalize;

pub use error::{NormalizeError, NormalizeResult};
pub use normalize::normalize;
