//! The normalization traversal.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use trellis_selection::{LinkedField, Selection, Selector};
use trellis_store::MutableRecordSource;
use trellis_types::{
    DataId, FieldValue, Record, Variables, ID_FIELD, ROOT_TYPE, TYPENAME_FIELD,
};

use crate::error::{NormalizeError, NormalizeResult};

/// Normalizes `payload` under `selector` into `sink`.
///
/// The sink is only written on success; any error leaves it exactly as it
/// was. Records already present in the sink (from the live store's state or
/// an earlier normalization into the same sink) are extended, not replaced.
pub fn normalize(
    sink: &mut dyn MutableRecordSource,
    selector: &Selector,
    payload: &Value,
) -> NormalizeResult<()> {
    let Value::Object(fields) = payload else {
        return Err(NormalizeError::NonObjectPayload {
            id: selector.data_id.clone(),
        });
    };
    let mut normalizer = Normalizer {
        sink,
        variables: &selector.variables,
        working: HashMap::new(),
    };
    let root_hint = selector.data_id.is_root().then_some(ROOT_TYPE);
    normalizer.normalize_record(&selector.data_id, root_hint, selector.selections(), fields)?;
    let records = normalizer.working.len();
    for (_, record) in normalizer.working.drain() {
        normalizer.sink.put(record);
    }
    debug!(
        operation = %selector.operation.name,
        root = %selector.data_id,
        records,
        "payload normalized"
    );
    Ok(())
}

struct Normalizer<'a> {
    sink: &'a mut dyn MutableRecordSource,
    variables: &'a Variables,
    /// Records touched by this call, flushed to the sink only on success.
    working: HashMap<DataId, Record>,
}

impl Normalizer<'_> {
    fn normalize_record(
        &mut self,
        id: &DataId,
        type_hint: Option<&str>,
        selections: &[Selection],
        payload: &Map<String, Value>,
    ) -> NormalizeResult<()> {
        let payload_type = payload
            .get(TYPENAME_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string);
        let record = self.record_mut(id);
        match payload_type {
            Some(type_name) => {
                record.set_scalar(TYPENAME_FIELD, Value::String(type_name));
            }
            None => {
                if record.type_name().is_none() {
                    if let Some(hint) = type_hint {
                        record.set_scalar(TYPENAME_FIELD, Value::String(hint.to_string()));
                    }
                }
            }
        }
        self.normalize_selections(id, selections, payload)
    }

    fn normalize_selections(
        &mut self,
        id: &DataId,
        selections: &[Selection],
        payload: &Map<String, Value>,
    ) -> NormalizeResult<()> {
        for selection in selections {
            match selection {
                Selection::Scalar(field) => {
                    let Some(value) = payload.get(field.response_key()) else {
                        return Err(NormalizeError::MissingField {
                            id: id.clone(),
                            field: field.response_key().to_string(),
                        });
                    };
                    let key = field.storage_key(self.variables);
                    self.record_mut(id).set(key, FieldValue::Scalar(value.clone()));
                }
                Selection::Linked(field) if field.plural => {
                    self.normalize_plural(id, field, payload)?;
                }
                Selection::Linked(field) => {
                    self.normalize_singular(id, field, payload)?;
                }
                Selection::Fragment(fragment) => {
                    let applies = self
                        .record_mut(id)
                        .type_name()
                        .map(|type_name| fragment.matches(type_name))
                        .unwrap_or(false);
                    if applies {
                        self.normalize_selections(id, &fragment.selections, payload)?;
                    }
                }
                Selection::Condition(condition) => {
                    if condition.passes(self.variables) {
                        self.normalize_selections(id, &condition.selections, payload)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn normalize_singular(
        &mut self,
        id: &DataId,
        field: &LinkedField,
        payload: &Map<String, Value>,
    ) -> NormalizeResult<()> {
        let key = field.storage_key(self.variables);
        match payload.get(field.response_key()) {
            None => Err(NormalizeError::MissingField {
                id: id.clone(),
                field: field.response_key().to_string(),
            }),
            Some(Value::Null) => {
                self.record_mut(id).set(key, FieldValue::null());
                Ok(())
            }
            Some(Value::Object(child_payload)) => {
                let child_id = child_payload
                    .get(ID_FIELD)
                    .and_then(Value::as_str)
                    .map(DataId::new)
                    .unwrap_or_else(|| DataId::client_child(id, &key));
                self.record_mut(id).set_link(key, child_id.clone());
                self.normalize_record(
                    &child_id,
                    field.concrete_type.as_deref(),
                    &field.selections,
                    child_payload,
                )
            }
            Some(_) => Err(NormalizeError::ShapeMismatch {
                id: id.clone(),
                field: field.response_key().to_string(),
                expected: "an object or null",
            }),
        }
    }

    fn normalize_plural(
        &mut self,
        id: &DataId,
        field: &LinkedField,
        payload: &Map<String, Value>,
    ) -> NormalizeResult<()> {
        let key = field.storage_key(self.variables);
        match payload.get(field.response_key()) {
            None => Err(NormalizeError::MissingField {
                id: id.clone(),
                field: field.response_key().to_string(),
            }),
            Some(Value::Null) => {
                self.record_mut(id).set(key, FieldValue::null());
                Ok(())
            }
            Some(Value::Array(items)) => {
                let mut links = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        Value::Null => links.push(None),
                        Value::Object(child_payload) => {
                            let child_id = child_payload
                                .get(ID_FIELD)
                                .and_then(Value::as_str)
                                .map(DataId::new)
                                .unwrap_or_else(|| {
                                    DataId::client_child_indexed(id, &key, index)
                                });
                            links.push(Some(child_id.clone()));
                            self.normalize_record(
                                &child_id,
                                field.concrete_type.as_deref(),
                                &field.selections,
                                child_payload,
                            )?;
                        }
                        _ => {
                            return Err(NormalizeError::ShapeMismatch {
                                id: id.clone(),
                                field: field.response_key().to_string(),
                                expected: "a list of objects",
                            });
                        }
                    }
                }
                self.record_mut(id).set_plural_link(key, links);
                Ok(())
            }
            Some(_) => Err(NormalizeError::ShapeMismatch {
                id: id.clone(),
                field: field.response_key().to_string(),
                expected: "a list or null",
            }),
        }
    }

    fn record_mut(&mut self, id: &DataId) -> &mut Record {
        if !self.working.contains_key(id) {
            let record = match self.sink.get(id) {
                Some(entry) => entry
                    .record()
                    .map(|existing| Record::clone(existing))
                    // tombstones are overwritten: normalization runs inside
                    // the publish path, the one place re-creation is legal
                    .unwrap_or_else(|| Record::new(id.clone())),
                None => Record::new(id.clone()),
            };
            self.working.insert(id.clone(), record);
        }
        self.working.get_mut(id).expect("record just ensured")
    }
}
