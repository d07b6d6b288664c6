//! Structural query subtraction.
//!
//! Given a query about to be fetched (the minuend) and a query whose data
//! is already cached (the subtrahend), [`subtract`] computes the residual:
//! the smallest subtree of the minuend that still has to go to the server.
//! Fetching the residual and combining it with the cached data yields
//! exactly what fetching the full minuend would have.
//!
//! Subtraction is purely structural. It compares selection trees, never the
//! store: field coverage is decided by storage key (name plus resolved
//! arguments), condition coverage by the gating variable and its passing
//! value, fragment coverage by type condition.

pub mod subtract;

pub use subtract::{subtract, subtract_resolved};
