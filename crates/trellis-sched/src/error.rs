//! Task errors.

use thiserror::Error;

/// Why a task chain's completion was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TaskError {
    /// A step returned an error; the rest of its chain was skipped.
    #[error("task step failed: {0}")]
    Failed(String),

    /// The scheduler dropped the task without executing it.
    #[error("task abandoned before execution")]
    Abandoned,
}

pub type TaskResult<T> = Result<T, TaskError>;
