//! Store errors.

use thiserror::Error;
use trellis_types::DataId;

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record has no server-addressable ancestor, so no query can
    /// re-fetch it from the root.
    #[error("record {0} is client-only and cannot be re-fetched")]
    NotRefetchable(DataId),

    /// Serializing the store for a debug snapshot failed.
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
