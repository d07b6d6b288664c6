//! Operations and selectors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use trellis_types::{DataId, Variables};

use crate::selection::Selection;

/// A named, compiled operation: the root selection tree of a query.
///
/// Operations are immutable and shared; every selector, snapshot, and
/// in-flight fetch referring to the same query holds the same `Arc`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub selections: Vec<Selection>,
}

impl Operation {
    pub fn new(name: impl Into<String>, selections: Vec<Selection>) -> Arc<Self> {
        Arc::new(Operation {
            name: name.into(),
            selections,
        })
    }
}

/// An operation anchored at a record with concrete variables: the unit of
/// reading, writing, and fetching.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    pub operation: Arc<Operation>,
    pub data_id: DataId,
    pub variables: Variables,
}

impl Selector {
    pub fn new(operation: Arc<Operation>, data_id: DataId, variables: Variables) -> Self {
        Selector {
            operation,
            data_id,
            variables,
        }
    }

    /// Anchors `operation` at the root record.
    pub fn root(operation: Arc<Operation>, variables: Variables) -> Self {
        Selector::new(operation, DataId::root(), variables)
    }

    pub fn selections(&self) -> &[Selection] {
        &self.operation.selections
    }
}
