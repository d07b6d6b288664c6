//! Field arguments and their resolution against variables.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use trellis_types::Variables;

/// One argument of a field selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: ArgumentValue,
}

impl Argument {
    /// A literal-valued argument.
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Argument {
            name: name.into(),
            value: ArgumentValue::Literal(value),
        }
    }

    /// An argument bound to a variable.
    pub fn variable(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Argument {
            name: name.into(),
            value: ArgumentValue::Variable(variable.into()),
        }
    }

    /// The concrete value of this argument under `variables`.
    pub fn resolve(&self, variables: &Variables) -> Value {
        self.value.resolve(variables)
    }
}

/// An argument value as written in the query: a literal, or a reference to
/// an operation variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArgumentValue {
    Literal(Value),
    Variable(String),
}

impl ArgumentValue {
    /// Resolves to a concrete JSON value. An unbound variable resolves to
    /// `null`, matching a caller that executed without supplying it.
    pub fn resolve(&self, variables: &Variables) -> Value {
        match self {
            ArgumentValue::Literal(value) => value.clone(),
            ArgumentValue::Variable(name) => {
                variables.get(name).cloned().unwrap_or(Value::Null)
            }
        }
    }
}

/// Resolves every argument to (name, value) pairs, ready for storage-key
/// derivation.
pub fn resolve_all(arguments: &[Argument], variables: &Variables) -> Vec<(String, Value)> {
    arguments
        .iter()
        .map(|argument| (argument.name.clone(), argument.resolve(variables)))
        .collect()
}
