/**
 * Backend Error Types
 *
 * Errors returned by HTTP handlers. Each variant maps to one HTTP status and
 * is converted into a JSON response by `conversion`.
 *
 * # Error Categories
 *
 * - `Validation` - the request body is well-formed but not acceptable (400)
 * - `NotFound` - the addressed resource does not exist (404)
 * - `Conflict` - the write collides with existing state (409)
 * - `HandlerError` - any other failure with an explicit status
 * - `Internal` - unexpected server-side failure (500)
 * - `SharedError` / `SerializationError` - wrapped lower-level errors
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::SharedError;

/// Backend-specific error types
///
/// ```rust
/// use itemtrail::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::not_found("item", "42");
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request content rejected by validation
    #[error("Validation error on {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// Addressed resource does not exist
    #[error("{resource} {id} not found")]
    NotFound {
        resource: &'static str,
        id: String,
    },

    /// Write collides with existing state
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Handler error with an explicit status code
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Unexpected server-side failure
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// - `Validation` - 400 Bad Request
    /// - `NotFound` - 404 Not Found
    /// - `Conflict` - 409 Conflict
    /// - `HandlerError` - Uses the status code from the error
    /// - `Internal` - 500 Internal Server Error
    /// - `SharedError` - Depends on the shared error type
    /// - `SerializationError` - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::HandlerError { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SharedError(err) => match err {
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            },
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::Conflict { message } => message.clone(),
            Self::HandlerError { message, .. } => message.clone(),
            Self::Internal { message } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Short type name reported as the error name of captured failures
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::NotFound { .. } => "NotFoundError",
            Self::Conflict { .. } => "ConflictError",
            Self::HandlerError { .. } => "HandlerError",
            Self::Internal { .. } => "InternalError",
            Self::SharedError(_) => "SharedError",
            Self::SerializationError(_) => "SerializationError",
        }
    }
}
