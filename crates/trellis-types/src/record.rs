//! Records, the nodes of the normalized graph.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::DataId;
use crate::key::StorageKey;
use crate::value::FieldValue;

/// Field every record stores its concrete type name under.
pub const TYPENAME_FIELD: &str = "__typename";

/// Field carrying a server-assigned identity, when the entity has one.
pub const ID_FIELD: &str = "id";

/// One node of the normalized graph: a flat map from storage key to value.
///
/// Records are plain data. They never embed other records; relationships are
/// expressed as [`FieldValue::Link`] and [`FieldValue::PluralLink`] entries
/// naming the target ids. Published records live behind `Arc` and are never
/// mutated in place; [`Record::merge`] produces the updated version and hands
/// back the original allocation when nothing changed, so "did this record
/// change" is a pointer comparison.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: DataId,
    fields: BTreeMap<StorageKey, FieldValue>,
}

impl Record {
    /// An empty record at `id`.
    pub fn new(id: DataId) -> Self {
        Record {
            id,
            fields: BTreeMap::new(),
        }
    }

    /// An empty record at `id` with its type name already set.
    pub fn with_type(id: DataId, type_name: &str) -> Self {
        let mut record = Record::new(id);
        record.set_scalar(TYPENAME_FIELD, Value::String(type_name.to_string()));
        record
    }

    /// The record's address.
    pub fn id(&self) -> &DataId {
        &self.id
    }

    /// The concrete type name, when the record has one.
    pub fn type_name(&self) -> Option<&str> {
        self.fields
            .get(TYPENAME_FIELD)
            .and_then(FieldValue::as_scalar)
            .and_then(Value::as_str)
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<StorageKey>, value: FieldValue) {
        self.fields.insert(key.into(), value);
    }

    /// Stores a scalar under `key`.
    pub fn set_scalar(&mut self, key: impl Into<StorageKey>, value: Value) {
        self.set(key, FieldValue::Scalar(value));
    }

    /// Stores a singular link under `key`.
    pub fn set_link(&mut self, key: impl Into<StorageKey>, target: DataId) {
        self.set(key, FieldValue::Link(target));
    }

    /// Stores a plural link under `key`.
    pub fn set_plural_link(&mut self, key: impl Into<StorageKey>, targets: Vec<Option<DataId>>) {
        self.set(key, FieldValue::PluralLink(targets));
    }

    /// Removes the value stored under `key`, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.fields.remove(key)
    }

    /// Iterates over all fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&StorageKey, &FieldValue)> {
        self.fields.iter()
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every record id this record links to, across all fields.
    pub fn linked_ids(&self) -> Vec<&DataId> {
        self.fields
            .values()
            .flat_map(|value| value.links())
            .collect()
    }

    /// Merges `next` into `existing`, field by field.
    ///
    /// Fields present in `next` overwrite; fields only in `existing` are
    /// retained. When every field of `next` already holds the same value,
    /// the existing allocation is returned unchanged, so callers can use
    /// [`Arc::ptr_eq`] to detect whether anything happened.
    ///
    /// # Panics
    ///
    /// Panics if the two records have different ids.
    pub fn merge(existing: &Arc<Record>, next: &Record) -> Arc<Record> {
        assert_eq!(
            existing.id, next.id,
            "invariant violation: merged records must share an id"
        );
        let mut updated: Option<Record> = None;
        for (key, value) in &next.fields {
            if existing.fields.get(key) != Some(value) {
                updated
                    .get_or_insert_with(|| Record::clone(existing))
                    .fields
                    .insert(key.clone(), value.clone());
            }
        }
        match updated {
            Some(record) => Arc::new(record),
            None => Arc::clone(existing),
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("fields", &self.fields)
            .finish()
    }
}

/// A store slot for one id: either a live record or a tombstone left by a
/// deletion. The tombstone is distinct from the id being absent entirely;
/// readers report a deleted record as `null` data but an absent one as
/// missing data.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordEntry {
    Present(Arc<Record>),
    Deleted,
}

impl RecordEntry {
    /// Wraps a freshly built record.
    pub fn present(record: Record) -> Self {
        RecordEntry::Present(Arc::new(record))
    }

    /// The live record, unless this slot is a tombstone.
    pub fn record(&self) -> Option<&Arc<Record>> {
        match self {
            RecordEntry::Present(record) => Some(record),
            RecordEntry::Deleted => None,
        }
    }

    /// True for a tombstone.
    pub fn is_deleted(&self) -> bool {
        matches!(self, RecordEntry::Deleted)
    }

    /// Identity comparison: live records compare by allocation, tombstones
    /// compare equal to each other. This is the change test publishes use;
    /// two structurally equal records in different allocations count as
    /// changed.
    pub fn ptr_eq(&self, other: &RecordEntry) -> bool {
        match (self, other) {
            (RecordEntry::Present(a), RecordEntry::Present(b)) => Arc::ptr_eq(a, b),
            (RecordEntry::Deleted, RecordEntry::Deleted) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(id: &str, name: &str) -> Record {
        let mut record = Record::with_type(DataId::new(id), "User");
        record.set_scalar(ID_FIELD, json!(id));
        record.set_scalar("name", json!(name));
        record
    }

    #[test]
    fn type_name_reads_the_typename_field() {
        let record = user("4", "Mark");
        assert_eq!(record.type_name(), Some("User"));
        assert_eq!(Record::new(DataId::new("x")).type_name(), None);
    }

    #[test]
    fn merge_without_changes_returns_the_same_allocation() {
        let existing = Arc::new(user("4", "Mark"));
        let next = user("4", "Mark");
        let merged = Record::merge(&existing, &next);
        assert!(Arc::ptr_eq(&existing, &merged));
    }

    #[test]
    fn merge_overwrites_and_retains() {
        let mut base = user("4", "Mark");
        base.set_scalar("age", json!(30));
        let existing = Arc::new(base);

        let mut next = Record::new(DataId::new("4"));
        next.set_scalar("name", json!("Zuck"));

        let merged = Record::merge(&existing, &next);
        assert!(!Arc::ptr_eq(&existing, &merged));
        assert_eq!(merged.get("name").unwrap().as_scalar(), Some(&json!("Zuck")));
        // untouched fields survive
        assert_eq!(merged.get("age").unwrap().as_scalar(), Some(&json!(30)));
        assert_eq!(merged.type_name(), Some("User"));
        // the original is unchanged
        assert_eq!(existing.get("name").unwrap().as_scalar(), Some(&json!("Mark")));
    }

    #[test]
    fn merge_treats_equal_values_as_unchanged() {
        let existing = Arc::new(user("4", "Mark"));
        let mut next = Record::new(DataId::new("4"));
        next.set_scalar("name", json!("Mark"));
        let merged = Record::merge(&existing, &next);
        assert!(Arc::ptr_eq(&existing, &merged));
    }

    #[test]
    #[should_panic(expected = "invariant violation")]
    fn merge_rejects_mismatched_ids() {
        let existing = Arc::new(user("4", "Mark"));
        let next = user("5", "Other");
        Record::merge(&existing, &next);
    }

    #[test]
    fn linked_ids_spans_all_fields() {
        let mut record = Record::new(DataId::new("4"));
        record.set_link("best_friend", DataId::new("7"));
        record.set_plural_link(
            "friends(first:2)",
            vec![Some(DataId::new("7")), None, Some(DataId::new("9"))],
        );
        record.set_scalar("name", json!("Mark"));
        let ids: Vec<&str> = record.linked_ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["7", "7", "9"]);
    }

    #[test]
    fn entry_identity_comparison() {
        let a = Arc::new(user("4", "Mark"));
        let same = RecordEntry::Present(Arc::clone(&a));
        let also_a = RecordEntry::Present(a);
        // structurally equal, different allocation
        let b = RecordEntry::Present(Arc::new(user("4", "Mark")));

        assert!(same.ptr_eq(&also_a));
        assert!(!same.ptr_eq(&b));
        assert!(RecordEntry::Deleted.ptr_eq(&RecordEntry::Deleted));
        assert!(!RecordEntry::Deleted.ptr_eq(&b));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeMap;

        fn field_map() -> impl Strategy<Value = BTreeMap<String, i64>> {
            proptest::collection::btree_map("[a-d]{1,3}", any::<i64>(), 0..6)
        }

        fn record_with(id: &str, fields: &BTreeMap<String, i64>) -> Record {
            let mut record = Record::new(DataId::new(id));
            for (key, value) in fields {
                record.set_scalar(key.clone(), json!(value));
            }
            record
        }

        proptest! {
            #[test]
            fn remerging_is_identity(a in field_map(), b in field_map()) {
                let base = Arc::new(record_with("r", &a));
                let next = record_with("r", &b);
                let merged = Record::merge(&base, &next);
                let again = Record::merge(&merged, &next);
                prop_assert!(Arc::ptr_eq(&merged, &again));
            }

            #[test]
            fn merge_unions_keys(a in field_map(), b in field_map()) {
                let base = Arc::new(record_with("r", &a));
                let next = record_with("r", &b);
                let merged = Record::merge(&base, &next);
                for key in a.keys().chain(b.keys()) {
                    prop_assert!(merged.get(key).is_some());
                }
                prop_assert_eq!(
                    merged.len(),
                    a.keys().chain(b.keys()).collect::<std::collections::BTreeSet<_>>().len()
                );
            }
        }
    }
}
