//! Storage keys.
//!
//! A field is stored under its name plus the argument values it was fetched
//! with, so the same field selected with different arguments occupies
//! different slots of a record. Arguments are sorted by name and rendered as
//! compact JSON, which makes the key a pure function of (name, resolved
//! arguments) regardless of the order the query listed them in.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The key a field's value is stored under inside a [`Record`].
///
/// Examples: `name`, `friends(first:10)`, `user(id:"4",active:true)`.
///
/// [`Record`]: crate::record::Record
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for a field selected without arguments.
    pub fn plain(name: impl Into<String>) -> Self {
        StorageKey(name.into())
    }

    /// Key for a field selected with the given resolved argument values.
    ///
    /// Arguments are sorted by name before rendering, so callers do not
    /// need to pre-sort. An empty argument list collapses to the plain
    /// field name.
    pub fn with_args(name: &str, args: &[(String, Value)]) -> Self {
        if args.is_empty() {
            return StorageKey(name.to_string());
        }
        let mut sorted: Vec<&(String, Value)> = args.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let mut out = String::with_capacity(name.len() + 16);
        out.push_str(name);
        out.push('(');
        for (i, (arg, value)) in sorted.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(arg);
            out.push(':');
            out.push_str(&value.to_string());
        }
        out.push(')');
        StorageKey(out)
    }

    /// The full key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The field name portion of the key, without any rendered arguments.
    pub fn name(&self) -> &str {
        match self.0.find('(') {
            Some(paren) => &self.0[..paren],
            None => &self.0,
        }
    }

    /// True when the key carries rendered arguments.
    pub fn has_args(&self) -> bool {
        self.0.contains('(')
    }
}

impl Borrow<str> for StorageKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.0)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        StorageKey(key.to_string())
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        StorageKey(key)
    }
}
