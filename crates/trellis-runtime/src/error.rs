//! Runtime errors.

use thiserror::Error;

use trellis_normalizer::NormalizeError;
use trellis_sched::TaskError;
use trellis_store::StoreError;

use crate::network::NetworkError;

/// Anything the environment surface can fail with.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("publish failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("task error: {0}")]
    Task(#[from] TaskError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
