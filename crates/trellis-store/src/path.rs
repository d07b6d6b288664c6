//! Query paths: how a record was reached, and how to fetch it again.

use serde_json::json;

use trellis_selection::{Argument, LinkedField, Operation, ScalarField, Selection, Selector};
use trellis_types::{DataId, Variables, ID_FIELD, TYPENAME_FIELD};

use crate::error::{StoreError, StoreResult};

/// The name the synthesized re-fetch operations carry.
const REFETCH_OPERATION: &str = "RefetchQuery";

/// The chain of fields a record was reached through, back to the nearest
/// re-fetchable root.
///
/// Records with a server id are re-fetchable directly. Client-addressed
/// records are not; to re-fetch one, its leaf selections have to be wrapped
/// in the parent fields leading back to a server-addressable ancestor (or
/// the query root). `QueryPath` records exactly that chain: a root path has
/// no parent, a field path exactly one.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryPath {
    /// Anchored at `id`: the query root, or a record with a server id.
    Root { id: DataId },
    /// Reached from `parent`'s path through `field`.
    Field {
        parent: Box<QueryPath>,
        field: LinkedField,
    },
}

impl QueryPath {
    /// A path anchored directly at `id`.
    pub fn root(id: DataId) -> Self {
        QueryPath::Root { id }
    }

    /// The path of a child reached through `field`. The field's own child
    /// selections are irrelevant here and dropped.
    pub fn child(&self, field: &LinkedField) -> Self {
        QueryPath::Field {
            parent: Box::new(self.clone()),
            field: field.clone().select(Vec::new()),
        }
    }

    /// Synthesizes the minimal root query that re-fetches `target` with the
    /// given leaf selections.
    ///
    /// A target with a server id is addressed directly through a
    /// `node(id:)` root field, regardless of how it was originally reached.
    /// A client-addressed target gets its selections wrapped in this path's
    /// parent fields until a server-addressable ancestor (or the query
    /// root) is found.
    pub fn refetch_operation(
        &self,
        target: &DataId,
        selections: Vec<Selection>,
    ) -> StoreResult<Selector> {
        let rooted = if target.is_client_generated() {
            self.wrap(selections)?
        } else {
            vec![node_field(target, with_identity(selections))]
        };
        Ok(Selector::root(
            Operation::new(REFETCH_OPERATION, rooted),
            Variables::new(),
        ))
    }

    fn wrap(&self, selections: Vec<Selection>) -> StoreResult<Vec<Selection>> {
        match self {
            QueryPath::Root { id } if id.is_root() => Ok(selections),
            QueryPath::Root { id } if !id.is_client_generated() => {
                Ok(vec![node_field(id, with_identity(selections))])
            }
            QueryPath::Root { id } => Err(StoreError::NotRefetchable(id.clone())),
            QueryPath::Field { parent, field } => {
                let wrapped = vec![field.clone().select(selections).into()];
                parent.wrap(wrapped)
            }
        }
    }
}

fn node_field(id: &DataId, selections: Vec<Selection>) -> Selection {
    LinkedField::new("node")
        .argument(Argument::literal("id", json!(id.as_str())))
        .select(selections)
        .into()
}

/// Ensures the selections carry the identity fields a re-fetched payload
/// needs to normalize back onto the same record.
fn with_identity(mut selections: Vec<Selection>) -> Vec<Selection> {
    let has = |name: &str, selections: &[Selection]| {
        selections
            .iter()
            .any(|s| matches!(s, Selection::Scalar(f) if f.name == name))
    };
    if !has(ID_FIELD, &selections) {
        selections.insert(0, ScalarField::new(ID_FIELD).requisite().into());
    }
    if !has(TYPENAME_FIELD, &selections) {
        selections.insert(1, ScalarField::new(TYPENAME_FIELD).requisite().into());
    }
    selections
}
