/**
 * Error Conversion
 *
 * All backend errors implement `IntoResponse` from Axum, allowing them to be
 * returned directly from handlers.
 *
 * # Response Format
 *
 * ```json
 * {
 *   "error": "Error message",
 *   "status": 400
 * }
 * ```
 *
 * Besides the body, every error response carries an `ApplicationFailure`
 * extension describing the failure. The observation middleware reads it to
 * build the captured error event; callers never see it.
 */

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::error::Error as _;

use crate::backend::error::types::BackendError;

/// Failure details attached to error responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationFailure {
    pub name: String,
    pub message: String,
    /// Rendered source chain, outermost first
    pub stack: Option<String>,
}

impl ApplicationFailure {
    pub fn from_error(err: &BackendError) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            name: err.kind().to_string(),
            message: err.message(),
            stack: (!chain.is_empty()).then(|| {
                std::iter::once(err.to_string())
                    .chain(chain)
                    .collect::<Vec<_>>()
                    .join("\n  caused by: ")
            }),
        }
    }
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let failure = ApplicationFailure::from_error(&self);

        let body = serde_json::json!({
            "error": failure.message,
            "status": status.as_u16(),
        });

        let mut response = (status, body.to_string()).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response.extensions_mut().insert(failure);
        response
    }
}
