//! Record sources: the read and write seams over normalized data.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use trellis_types::{DataId, Record, RecordEntry};

use crate::error::StoreResult;

/// Read access to a set of records.
///
/// `get` distinguishes three states: `Some(Present(_))` is a live record,
/// `Some(Deleted)` is a tombstone (reads as null), and `None` means the id
/// is unknown here (reads as missing data).
pub trait RecordSource: Send + Sync {
    /// The entry stored for `id`, if any.
    fn get(&self, id: &DataId) -> Option<RecordEntry>;

    /// True when the source holds an entry (live or tombstone) for `id`.
    fn has(&self, id: &DataId) -> bool {
        self.get(id).is_some()
    }

    /// Every id with an entry.
    fn ids(&self) -> Vec<DataId>;

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write access. Mutation is wholesale entry replacement; partial record
/// updates are read-merge-put in the caller.
pub trait MutableRecordSource: RecordSource {
    /// Stores a freshly built record, replacing any existing entry.
    fn put(&mut self, record: Record);

    /// Stores an existing entry under `id`.
    fn put_entry(&mut self, id: DataId, entry: RecordEntry);

    /// Tombstones `id`. The entry remains and reads as deleted.
    fn delete(&mut self, id: DataId);

    /// Erases the entry for `id` entirely, as if never written.
    fn remove(&mut self, id: &DataId);

    /// Erases everything.
    fn clear(&mut self);
}

/// The plain in-memory record source.
///
/// Serves as the live store's base and as the scratch sink normalization
/// and updaters write into before a publish merges their output.
#[derive(Clone, Debug, Default)]
pub struct RecordSourceMap {
    records: HashMap<DataId, RecordEntry>,
}

impl RecordSourceMap {
    pub fn new() -> Self {
        RecordSourceMap::default()
    }

    /// Iterates over all entries in arbitrary order.
    pub fn entries(&self) -> impl Iterator<Item = (&DataId, &RecordEntry)> {
        self.records.iter()
    }

    /// Serializes the source as one JSON object keyed by id, tombstones as
    /// `null`. Ids are sorted for stable output. Debugging aid only.
    pub fn to_json(&self) -> StoreResult<Value> {
        let sorted: BTreeMap<&DataId, &RecordEntry> = self.records.iter().collect();
        let mut out = serde_json::Map::with_capacity(sorted.len());
        for (id, entry) in sorted {
            let value = match entry.record() {
                Some(record) => serde_json::to_value(record.as_ref())?,
                None => Value::Null,
            };
            out.insert(id.as_str().to_string(), value);
        }
        Ok(Value::Object(out))
    }
}

impl RecordSource for RecordSourceMap {
    fn get(&self, id: &DataId) -> Option<RecordEntry> {
        self.records.get(id).cloned()
    }

    fn has(&self, id: &DataId) -> bool {
        self.records.contains_key(id)
    }

    fn ids(&self) -> Vec<DataId> {
        self.records.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

impl MutableRecordSource for RecordSourceMap {
    fn put(&mut self, record: Record) {
        self.records
            .insert(record.id().clone(), RecordEntry::present(record));
    }

    fn put_entry(&mut self, id: DataId, entry: RecordEntry) {
        self.records.insert(id, entry);
    }

    fn delete(&mut self, id: DataId) {
        self.records.insert(id, RecordEntry::Deleted);
    }

    fn remove(&mut self, id: &DataId) {
        self.records.remove(id);
    }

    fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, name: &str) -> Record {
        let mut record = Record::with_type(DataId::new(id), "User");
        record.set_scalar("name", json!(name));
        record
    }

    #[test]
    fn get_distinguishes_live_tombstone_and_unknown() {
        let mut source = RecordSourceMap::new();
        source.put(user("4", "Mark"));
        source.delete(DataId::new("5"));

        assert!(matches!(
            source.get(&DataId::new("4")),
            Some(RecordEntry::Present(_))
        ));
        assert!(matches!(
            source.get(&DataId::new("5")),
            Some(RecordEntry::Deleted)
        ));
        assert_eq!(source.get(&DataId::new("6")), None);
        assert!(source.has(&DataId::new("5")));
        assert!(!source.has(&DataId::new("6")));
    }

    #[test]
    fn remove_erases_while_delete_tombstones() {
        let mut source = RecordSourceMap::new();
        source.put(user("4", "Mark"));
        source.delete(DataId::new("4"));
        assert_eq!(source.len(), 1);
        source.remove(&DataId::new("4"));
        assert_eq!(source.len(), 0);
        assert_eq!(source.get(&DataId::new("4")), None);
    }

    #[test]
    fn to_json_sorts_ids_and_nulls_tombstones() {
        let mut source = RecordSourceMap::new();
        source.put(user("b", "Bee"));
        source.delete(DataId::new("a"));

        let json = source.to_json().unwrap();
        let object = json.as_object().unwrap();
        let keys: Vec<&String> = object.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(object["a"].is_null());
        assert_eq!(object["b"]["fields"]["name"]["Scalar"], json!("Bee"));
    }
}
