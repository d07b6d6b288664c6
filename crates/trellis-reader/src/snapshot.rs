//! Snapshots: the result of one read.

use std::collections::HashMap;

use serde_json::Value;

use trellis_selection::Selector;
use trellis_types::{DataId, RecordEntry};

/// Every id a read touched, with what it found there: a live record, a
/// tombstone, or `None` when the id was unknown at read time.
pub type SeenRecords = HashMap<DataId, Option<RecordEntry>>;

/// The result of reading a selector against a record source.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub selector: Selector,
    /// Tree-shaped data. Selected fields with no stored value are omitted
    /// from objects (and read as `null` inside lists); the root is `null`
    /// when the anchor record is unknown or deleted.
    pub data: Value,
    /// True when any selected field had no stored value.
    pub is_missing_data: bool,
    pub seen_records: SeenRecords,
}

impl Snapshot {
    /// The ids this snapshot depends on.
    pub fn seen_ids(&self) -> impl Iterator<Item = &DataId> {
        self.seen_records.keys()
    }

    /// True when `other` saw referentially identical records for exactly
    /// the same ids. Records that merely compare structurally equal count
    /// as changed; the store hands out the same allocation when nothing
    /// happened, and that identity is the change signal.
    pub fn same_records(&self, other: &Snapshot) -> bool {
        self.seen_records.len() == other.seen_records.len()
            && self.seen_records.iter().all(|(id, entry)| {
                match other.seen_records.get(id) {
                    Some(other_entry) => match (entry, other_entry) {
                        (Some(a), Some(b)) => a.ptr_eq(b),
                        (None, None) => true,
                        _ => false,
                    },
                    None => false,
                }
            })
    }

    /// True when this snapshot depends on any of `ids`.
    pub fn depends_on<'a>(&self, ids: impl IntoIterator<Item = &'a DataId>) -> bool {
        ids.into_iter().any(|id| self.seen_records.contains_key(id))
    }
}
