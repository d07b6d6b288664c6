//! Reading snapshots out of a normalized record source.
//!
//! [`read`] walks a selector's tree over a [`RecordSource`] and rebuilds
//! the hierarchical data the selection describes, without ever mutating the
//! source. The result is a [`Snapshot`]: the data, a flag saying whether
//! any selected field was absent, and the set of record ids the traversal
//! touched. The seen set is what retention and change
//! detection are built on, so the reader records every id it visits even
//! when no record exists there yet.
//!
//! [`RecordSource`]: trellis_store::RecordSource

pub mod read;
pub mod snapshot;

pub use read::read;
pub use snapshot::{SeenRecords, Snapshot};
