//! Record storage for the Trellis cache.
//!
//! The store is the single place normalized data lives:
//!
//! - [`RecordSource`] / [`MutableRecordSource`] are the read and write seams
//!   everything else traverses. [`RecordSourceMap`] is the plain in-memory
//!   implementation, used both as the live base and as the scratch sinks
//!   normalization and updaters write into.
//! - [`RecordStore`] is the live store: a base source plus an ordered stack
//!   of optimistic layers. Reads see layers top-down, then the base. The
//!   store is mutated only by the publish path and the garbage collector.
//! - [`QueryPath`] records how a client-addressed record was reached, and
//!   synthesizes the minimal query that re-fetches it.
//! - [`GarbageCollector`] reference-counts retained record ids and sweeps
//!   everything unreachable, re-checking counts at the moment of deletion.

pub mod error;
pub mod gc;
pub mod path;
pub mod source;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use gc::{GarbageCollector, GcHold, SweepReport};
pub use path::QueryPath;
pub use source::{MutableRecordSource, RecordSource, RecordSourceMap};
pub use store::{RecordStore, UpdateToken};
