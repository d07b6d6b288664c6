//! Stored field values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::DataId;

/// The value stored under one [`StorageKey`] of a record.
///
/// Nested objects are never stored inline. Normalization replaces them with
/// [`FieldValue::Link`] or [`FieldValue::PluralLink`] entries pointing at
/// their own records, which is what keeps every entity single-sourced no
/// matter how many query paths reach it.
///
/// [`StorageKey`]: crate::key::StorageKey
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A leaf JSON value, including `null` and arrays of leaves.
    Scalar(Value),
    /// A reference to a single record.
    Link(DataId),
    /// An ordered list of record references. `None` marks a null entry the
    /// server returned inside the list; list order is always preserved.
    PluralLink(Vec<Option<DataId>>),
}

impl FieldValue {
    /// A scalar `null`.
    pub fn null() -> Self {
        FieldValue::Scalar(Value::Null)
    }

    /// The scalar value, if this is a scalar field.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            FieldValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The linked id, if this is a singular link.
    pub fn as_link(&self) -> Option<&DataId> {
        match self {
            FieldValue::Link(id) => Some(id),
            _ => None,
        }
    }

    /// The linked ids, if this is a plural link.
    pub fn as_plural_link(&self) -> Option<&[Option<DataId>]> {
        match self {
            FieldValue::PluralLink(ids) => Some(ids),
            _ => None,
        }
    }

    /// True when this is a scalar `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }

    /// Every record id this value points at, in list order for plural
    /// links. Null list entries are skipped.
    pub fn links(&self) -> Vec<&DataId> {
        match self {
            FieldValue::Scalar(_) => Vec::new(),
            FieldValue::Link(id) => vec![id],
            FieldValue::PluralLink(ids) => ids.iter().flatten().collect(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<DataId> for FieldValue {
    fn from(id: DataId) -> Self {
        FieldValue::Link(id)
    }
}
