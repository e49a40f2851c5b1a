//! Errors returned by `TodoClient` parse methods.
//!
//! The server answers every failure with a `{"message": ...}` envelope.
//! 400 and 404 get their own variants because callers branch on them; any
//! other unexpected status lands in `Http`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 400: the request was rejected, e.g. a blank title.
    #[error("rejected: {0}")]
    Validation(String),

    /// 404: no such todo, or no such route.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other unexpected status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body could not be decoded into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
