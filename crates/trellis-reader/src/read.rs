//! The read traversal.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use trellis_selection::{Selection, Selector};
use trellis_store::RecordSource;
use trellis_types::{DataId, FieldValue, Record, RecordEntry, Variables};

use crate::snapshot::{SeenRecords, Snapshot};

/// Reads `selector` against `source`, producing a best-effort snapshot.
///
/// Absent fields never abort the read; they set `is_missing_data` and the
/// traversal keeps going, so a partially cached query still yields every
/// field that is available.
pub fn read(source: &dyn RecordSource, selector: &Selector) -> Snapshot {
    let mut reader = Reader {
        source,
        variables: &selector.variables,
        seen: HashMap::new(),
        missing: false,
    };
    let data = reader
        .read_record(&selector.data_id, selector.selections())
        .unwrap_or(Value::Null);
    debug!(
        operation = %selector.operation.name,
        root = %selector.data_id,
        missing = reader.missing,
        seen = reader.seen.len(),
        "snapshot read"
    );
    Snapshot {
        selector: selector.clone(),
        data,
        is_missing_data: reader.missing,
        seen_records: reader.seen,
    }
}

struct Reader<'a> {
    source: &'a dyn RecordSource,
    variables: &'a Variables,
    seen: SeenRecords,
    missing: bool,
}

impl Reader<'_> {
    /// `None` means the id was unknown; the caller decides how that reads
    /// (omitted key for singular links, `null` inside lists).
    fn read_record(&mut self, id: &DataId, selections: &[Selection]) -> Option<Value> {
        let entry = self.source.get(id);
        self.seen.insert(id.clone(), entry.clone());
        match entry {
            None => {
                self.missing = true;
                None
            }
            Some(RecordEntry::Deleted) => Some(Value::Null),
            Some(RecordEntry::Present(record)) => {
                let mut data = Map::new();
                self.read_selections(&record, selections, &mut data);
                Some(Value::Object(data))
            }
        }
    }

    fn read_selections(
        &mut self,
        record: &Record,
        selections: &[Selection],
        out: &mut Map<String, Value>,
    ) {
        for selection in selections {
            match selection {
                Selection::Scalar(field) => {
                    let key = field.storage_key(self.variables);
                    match record.get(key.as_str()) {
                        Some(FieldValue::Scalar(value)) => {
                            out.insert(field.response_key().to_string(), value.clone());
                        }
                        // a link under a scalar selection or no value at
                        // all both read as unfetched
                        Some(_) | None => self.missing = true,
                    }
                }
                Selection::Linked(field) if field.plural => {
                    let key = field.storage_key(self.variables);
                    match record.get(key.as_str()) {
                        Some(FieldValue::PluralLink(ids)) => {
                            let mut items = Vec::with_capacity(ids.len());
                            for child in ids {
                                match child {
                                    Some(child_id) => items.push(
                                        self.read_record(child_id, &field.selections)
                                            .unwrap_or(Value::Null),
                                    ),
                                    None => items.push(Value::Null),
                                }
                            }
                            out.insert(field.response_key().to_string(), Value::Array(items));
                        }
                        Some(FieldValue::Scalar(Value::Null)) => {
                            out.insert(field.response_key().to_string(), Value::Null);
                        }
                        Some(_) | None => self.missing = true,
                    }
                }
                Selection::Linked(field) => {
                    let key = field.storage_key(self.variables);
                    match record.get(key.as_str()) {
                        Some(FieldValue::Link(child_id)) => {
                            let child_id = child_id.clone();
                            if let Some(value) = self.read_record(&child_id, &field.selections) {
                                out.insert(field.response_key().to_string(), value);
                            }
                        }
                        Some(FieldValue::Scalar(Value::Null)) => {
                            out.insert(field.response_key().to_string(), Value::Null);
                        }
                        Some(_) | None => self.missing = true,
                    }
                }
                Selection::Fragment(fragment) => match record.type_name() {
                    Some(type_name) if fragment.matches(type_name) => {
                        self.read_selections(record, &fragment.selections, out);
                    }
                    Some(_) => {}
                    // no stored type: cannot tell whether the fragment
                    // applies
                    None => self.missing = true,
                },
                Selection::Condition(condition) => {
                    if condition.passes(self.variables) {
                        self.read_selections(record, &condition.selections, out);
                    }
                }
            }
        }
    }
}
