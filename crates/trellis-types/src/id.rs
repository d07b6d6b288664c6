//! Record addresses.
//!
//! A [`DataId`] names one record in the normalized graph. Ids the server
//! handed us are used verbatim; ids the client had to invent are prefixed
//! with `client:` and derived deterministically from the position of the
//! node in the response, so re-normalizing the same payload always lands on
//! the same addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::StorageKey;

/// Prefix carried by every id the client minted itself.
pub const CLIENT_ID_PREFIX: &str = "client:";

/// The address of the root record, the entry point of every query.
pub const ROOT_ID: &str = "client:root";

/// Synthetic type name of the root record.
pub const ROOT_TYPE: &str = "__Root";

/// The address of a record in the store.
///
/// `DataId` is an opaque string. Equality and ordering are plain string
/// comparisons; the only structure Trellis reads back out of an id is the
/// [`CLIENT_ID_PREFIX`] marking client-generated records.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataId(String);

impl DataId {
    /// Wraps an id the server assigned (or any pre-formed id string).
    pub fn new(id: impl Into<String>) -> Self {
        DataId(id.into())
    }

    /// The root record's id.
    pub fn root() -> Self {
        DataId(ROOT_ID.to_string())
    }

    /// Derives the id for an unidentified child reached from `parent`
    /// through the field stored under `key`.
    ///
    /// The derived id is `parent:key`, prefixed with `client:` if the
    /// parent was a server id. Deriving twice from the same position yields
    /// the same id, which is what lets repeated normalization converge on
    /// the same records.
    pub fn client_child(parent: &DataId, key: &StorageKey) -> Self {
        Self::prefixed(format!("{}:{}", parent.0, key))
    }

    /// Derives the id for the `index`-th unidentified item of a plural
    /// field reached from `parent` through `key`.
    pub fn client_child_indexed(parent: &DataId, key: &StorageKey, index: usize) -> Self {
        Self::prefixed(format!("{}:{}:{}", parent.0, key, index))
    }

    /// True when this id was minted by the client rather than the server.
    pub fn is_client_generated(&self) -> bool {
        self.0.starts_with(CLIENT_ID_PREFIX)
    }

    /// True when this is the root record's id.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn prefixed(raw: String) -> Self {
        if raw.starts_with(CLIENT_ID_PREFIX) {
            DataId(raw)
        } else {
            DataId(format!("{CLIENT_ID_PREFIX}{raw}"))
        }
    }
}

impl fmt::Debug for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataId({})", self.0)
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DataId {
    fn from(id: &str) -> Self {
        DataId(id.to_string())
    }
}

impl From<String> for DataId {
    fn from(id: String) -> Self {
        DataId(id)
    }
}

impl From<DataId> for String {
    fn from(id: DataId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_id_is_client_generated() {
        let root = DataId::root();
        assert_eq!(root.as_str(), "client:root");
        assert!(root.is_client_generated());
        assert!(root.is_root());
    }

    #[test]
    fn server_ids_pass_through() {
        let id = DataId::new("4");
        assert_eq!(id.as_str(), "4");
        assert!(!id.is_client_generated());
        assert!(!id.is_root());
    }

    #[test]
    fn child_of_server_id_gains_prefix() {
        let parent = DataId::new("4");
        let key = StorageKey::plain("profile");
        let child = DataId::client_child(&parent, &key);
        assert_eq!(child.as_str(), "client:4:profile");
        assert!(child.is_client_generated());
    }

    #[test]
    fn child_of_client_id_is_not_double_prefixed() {
        let parent = DataId::root();
        let key = StorageKey::plain("viewer");
        let child = DataId::client_child(&parent, &key);
        assert_eq!(child.as_str(), "client:root:viewer");
    }

    #[test]
    fn indexed_children_are_distinct() {
        let parent = DataId::new("4");
        let key = StorageKey::plain("emails");
        let first = DataId::client_child_indexed(&parent, &key, 0);
        let second = DataId::client_child_indexed(&parent, &key, 1);
        assert_eq!(first.as_str(), "client:4:emails:0");
        assert_eq!(second.as_str(), "client:4:emails:1");
        assert_ne!(first, second);
    }

    #[test]
    fn derivation_is_deterministic() {
        let parent = DataId::new("4");
        let key = StorageKey::plain("profile");
        assert_eq!(
            DataId::client_child(&parent, &key),
            DataId::client_child(&parent, &key)
        );
    }

    #[test]
    fn display_and_debug() {
        let id = DataId::new("4");
        assert_eq!(format!("{id}"), "4");
        assert_eq!(format!("{id:?}"), "DataId(4)");
    }
}
