//! Normalization errors.

use thiserror::Error;
use trellis_types::DataId;

/// A payload that does not satisfy the selection it was fetched for.
///
/// Any of these aborts the normalization with the sink left as it was
/// before the call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// A selected field has no value in the payload.
    #[error("payload has no value for field `{field}` on record {id}")]
    MissingField { id: DataId, field: String },

    /// A field value does not have the shape its selection requires.
    #[error("field `{field}` on record {id} should be {expected} in the payload")]
    ShapeMismatch {
        id: DataId,
        field: String,
        expected: &'static str,
    },

    /// The payload for a record is not a JSON object.
    #[error("payload for record {id} must be a JSON object")]
    NonObjectPayload { id: DataId },
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;
