//! Field selections.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use trellis_types::{StorageKey, Variables};

use crate::arguments::{resolve_all, Argument};
use crate::selection::Selection;

/// A leaf field: its value is stored verbatim as a scalar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<Argument>,
    /// Requisite fields (identity and type fields needed to re-fetch a
    /// record) are never pruned by query subtraction.
    pub requisite: bool,
}

impl ScalarField {
    pub fn new(name: impl Into<String>) -> Self {
        ScalarField {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            requisite: false,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn requisite(mut self) -> Self {
        self.requisite = true;
        self
    }

    /// The key this field appears under in response payloads and snapshot
    /// data: the alias when one is set, the field name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// The key this field is stored under, with arguments resolved against
    /// `variables`.
    pub fn storage_key(&self, variables: &Variables) -> StorageKey {
        StorageKey::with_args(&self.name, &resolve_all(&self.arguments, variables))
    }
}

/// A field whose value is one record or a list of records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkedField {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: Vec<Argument>,
    /// Singular link or ordered list of links.
    pub plural: bool,
    /// When set, every record reached through this field is known to have
    /// this concrete type; normalization may fill in a missing `__typename`
    /// from it.
    pub concrete_type: Option<String>,
    pub selections: Vec<Selection>,
    pub requisite: bool,
}

impl LinkedField {
    pub fn new(name: impl Into<String>) -> Self {
        LinkedField {
            name: name.into(),
            alias: None,
            arguments: Vec::new(),
            plural: false,
            concrete_type: None,
            selections: Vec::new(),
            requisite: false,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn plural(mut self) -> Self {
        self.plural = true;
        self
    }

    pub fn of_type(mut self, concrete_type: impl Into<String>) -> Self {
        self.concrete_type = Some(concrete_type.into());
        self
    }

    pub fn select(mut self, selections: Vec<Selection>) -> Self {
        self.selections = selections;
        self
    }

    pub fn requisite(mut self) -> Self {
        self.requisite = true;
        self
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn storage_key(&self, variables: &Variables) -> StorageKey {
        StorageKey::with_args(&self.name, &resolve_all(&self.arguments, variables))
    }

    /// The resolved value of the argument named `name`, when present.
    pub fn resolved_argument(&self, name: &str, variables: &Variables) -> Option<Value> {
        self.arguments
            .iter()
            .find(|argument| argument.name == name)
            .map(|argument| argument.resolve(variables))
    }
}
