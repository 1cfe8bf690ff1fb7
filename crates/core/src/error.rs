//! Core error model.

use thiserror::Error;

/// Result type used across the value layer.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures raised while building or decoding envelope values.
///
/// Transport and dispatch failures live in `geomajas-dispatch`; this enum only
/// covers deterministic problems with the values themselves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A request could not be encoded into the opaque payload.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// A response payload did not match the expected shape.
    #[error("failed to decode response payload: {0}")]
    Decode(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
