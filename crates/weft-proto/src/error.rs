//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol payloads.
#[derive(Debug, Error)]
pub enum Error {
    /// A filter used an operator outside the supported set.
    #[error("unsupported filter operator '{op}'")]
    UnsupportedOperator { op: String },

    /// The request envelope was structurally invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to encode a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failed to decode a payload.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
