//! Error types for cluster access and object inspection.

use thiserror::Error;

use crate::readiness::Milestone;

/// Errors talking to the orchestrator API.
///
/// Fatal to the operation that issued the request, never to the whole run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The object does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// The write carried a stale resource version.
    #[error("conflicting update to {kind} '{name}': {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    /// The API server rejected the request.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The kind has no known API resource mapping.
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),

    /// Connection, TLS or authentication failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns true for an optimistic-concurrency rejection.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true when only the payload was malformed, not the connection.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// An expected field is absent or has the wrong shape.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{object}: field '{field}' is missing")]
    MissingField { object: String, field: String },

    #[error("{object}: field '{field}' is not {expected}")]
    WrongType {
        object: String,
        field: String,
        expected: &'static str,
    },

    #[error("{object}: field '{field}' is out of range ({value})")]
    OutOfRange {
        object: String,
        field: String,
        value: i64,
    },
}

/// One of the readiness milestones was never recorded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("missing {0} condition")]
pub struct MissingMilestone(pub Milestone);
