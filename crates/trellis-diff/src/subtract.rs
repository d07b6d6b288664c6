//! The subtraction traversal.

use serde_json::Value;

use trellis_selection::arguments::resolve_all;
use trellis_selection::{LinkedField, ScalarField, Selection};
use trellis_types::{StorageKey, Variables};

/// Connection-style page bounds get superset treatment instead of exact
/// key matching.
const FIRST_ARG: &str = "first";
const LAST_ARG: &str = "last";

/// Subtracts `subtrahend` from `minuend`, both resolved under `variables`.
///
/// Returns `None` when the subtrahend fully covers the minuend (nothing
/// left to fetch) and the surviving subtree otherwise; a disjoint
/// subtrahend leaves the minuend unchanged.
pub fn subtract(
    minuend: &[Selection],
    subtrahend: &[Selection],
    variables: &Variables,
) -> Option<Vec<Selection>> {
    subtract_resolved(minuend, variables, subtrahend, variables)
}

/// [`subtract`] with each side resolved under its own variables, for
/// diffing against an operation that executed with different bindings.
pub fn subtract_resolved(
    minuend: &[Selection],
    minuend_variables: &Variables,
    subtrahend: &[Selection],
    subtrahend_variables: &Variables,
) -> Option<Vec<Selection>> {
    let mut residual = Vec::new();
    // requisite fields ride along but do not keep a node alive on their own
    let mut survivors = 0usize;

    for selection in minuend {
        if selection.is_requisite() {
            residual.push(selection.clone());
            continue;
        }
        match selection {
            Selection::Scalar(field) => {
                if !scalar_covered(field, minuend_variables, subtrahend, subtrahend_variables) {
                    residual.push(selection.clone());
                    survivors += 1;
                }
            }
            Selection::Linked(field) => {
                if let Some(surviving) =
                    linked_residual(field, minuend_variables, subtrahend, subtrahend_variables)
                {
                    residual.push(Selection::Linked(surviving));
                    survivors += 1;
                }
            }
            Selection::Fragment(fragment) => {
                let matched = subtrahend.iter().find_map(|candidate| match candidate {
                    Selection::Fragment(other)
                        if other.type_condition == fragment.type_condition =>
                    {
                        Some(other)
                    }
                    _ => None,
                });
                match matched {
                    None => {
                        residual.push(selection.clone());
                        survivors += 1;
                    }
                    Some(other) => {
                        if let Some(children) = subtract_resolved(
                            &fragment.selections,
                            minuend_variables,
                            &other.selections,
                            subtrahend_variables,
                        ) {
                            let mut surviving = fragment.clone();
                            surviving.selections = children;
                            residual.push(Selection::Fragment(surviving));
                            survivors += 1;
                        }
                    }
                }
            }
            Selection::Condition(condition) => {
                let matched = subtrahend.iter().find_map(|candidate| match candidate {
                    Selection::Condition(other)
                        if other.variable == condition.variable
                            && other.passing_value == condition.passing_value =>
                    {
                        Some(other)
                    }
                    _ => None,
                });
                match matched {
                    None => {
                        residual.push(selection.clone());
                        survivors += 1;
                    }
                    Some(other) => {
                        if let Some(children) = subtract_resolved(
                            &condition.selections,
                            minuend_variables,
                            &other.selections,
                            subtrahend_variables,
                        ) {
                            let mut surviving = condition.clone();
                            surviving.selections = children;
                            residual.push(Selection::Condition(surviving));
                            survivors += 1;
                        }
                    }
                }
            }
        }
    }

    if survivors == 0 {
        None
    } else {
        Some(residual)
    }
}

fn scalar_covered(
    field: &ScalarField,
    minuend_variables: &Variables,
    subtrahend: &[Selection],
    subtrahend_variables: &Variables,
) -> bool {
    let key = field.storage_key(minuend_variables);
    subtrahend.iter().any(|candidate| {
        matches!(candidate, Selection::Scalar(other) if other.storage_key(subtrahend_variables) == key)
    })
}

/// `None` when the field is fully covered; otherwise the field with only
/// its surviving children.
fn linked_residual(
    field: &LinkedField,
    minuend_variables: &Variables,
    subtrahend: &[Selection],
    subtrahend_variables: &Variables,
) -> Option<LinkedField> {
    let matched = subtrahend.iter().find_map(|candidate| match candidate {
        Selection::Linked(other)
            if covers_field(field, minuend_variables, other, subtrahend_variables) =>
        {
            Some(other)
        }
        _ => None,
    });
    match matched {
        None => Some(field.clone()),
        Some(other) => subtract_resolved(
            &field.selections,
            minuend_variables,
            &other.selections,
            subtrahend_variables,
        )
        .map(|children| field.clone().select(children)),
    }
}

/// Whether the subtrahend field's stored data covers the minuend field's.
fn covers_field(
    minuend: &LinkedField,
    minuend_variables: &Variables,
    subtrahend: &LinkedField,
    subtrahend_variables: &Variables,
) -> bool {
    if minuend.storage_key(minuend_variables) == subtrahend.storage_key(subtrahend_variables) {
        return true;
    }
    if minuend.name != subtrahend.name {
        return false;
    }
    // a larger page bound subsumes a smaller one when everything else
    // about the field matches
    if page_free_key(minuend, minuend_variables) != page_free_key(subtrahend, subtrahend_variables)
    {
        return false;
    }
    bound_covers(
        page_bound(minuend, FIRST_ARG, minuend_variables),
        page_bound(subtrahend, FIRST_ARG, subtrahend_variables),
    ) && bound_covers(
        page_bound(minuend, LAST_ARG, minuend_variables),
        page_bound(subtrahend, LAST_ARG, subtrahend_variables),
    )
}

#[derive(Clone, Copy, PartialEq)]
enum PageBound {
    Absent,
    Count(i64),
    Other,
}

fn page_bound(field: &LinkedField, name: &str, variables: &Variables) -> PageBound {
    match field.resolved_argument(name, variables) {
        None => PageBound::Absent,
        Some(value) => value
            .as_i64()
            .map(PageBound::Count)
            .unwrap_or(PageBound::Other),
    }
}

fn bound_covers(minuend: PageBound, subtrahend: PageBound) -> bool {
    match (minuend, subtrahend) {
        (PageBound::Absent, PageBound::Absent) => true,
        (PageBound::Count(wanted), PageBound::Count(cached)) => cached >= wanted,
        _ => false,
    }
}

/// The field's storage key with the page-bound arguments stripped.
fn page_free_key(field: &LinkedField, variables: &Variables) -> StorageKey {
    let args: Vec<(String, Value)> = resolve_all(&field.arguments, variables)
        .into_iter()
        .filter(|(name, _)| name != FIRST_ARG && name != LAST_ARG)
        .collect();
    StorageKey::with_args(&field.name, &args)
}
