//! Inline fragments and conditions.

use serde::{Deserialize, Serialize};

use trellis_types::Variables;

use crate::selection::Selection;

/// A group of selections that apply only to records of one concrete type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

impl InlineFragment {
    pub fn on(type_condition: impl Into<String>, selections: Vec<Selection>) -> Self {
        InlineFragment {
            type_condition: type_condition.into(),
            selections,
        }
    }

    /// True when the fragment applies to a record of `type_name`.
    pub fn matches(&self, type_name: &str) -> bool {
        self.type_condition == type_name
    }
}

/// A group of selections gated on a boolean variable, the stored form of
/// `@include(if: $v)` / `@skip(if: $v)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    /// The variable value under which the selections apply: `true` for an
    /// include-style condition, `false` for a skip-style one.
    pub passing_value: bool,
    pub selections: Vec<Selection>,
}

impl Condition {
    pub fn include_if(variable: impl Into<String>, selections: Vec<Selection>) -> Self {
        Condition {
            variable: variable.into(),
            passing_value: true,
            selections,
        }
    }

    pub fn skip_if(variable: impl Into<String>, selections: Vec<Selection>) -> Self {
        Condition {
            variable: variable.into(),
            passing_value: false,
            selections,
        }
    }

    /// Whether the gated selections apply under `variables`. An unbound or
    /// non-boolean variable counts as `false`.
    pub fn passes(&self, variables: &Variables) -> bool {
        variables.get_bool(&self.variable).unwrap_or(false) == self.passing_value
    }
}
