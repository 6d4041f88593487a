/**
 * Telemetry Error Types
 *
 * Failures of the observability side channel. None of these ever reach an
 * HTTP caller: retrieval failures degrade to "no history" and emission
 * failures are logged and dropped. The variants exist so the logs can tell
 * an unreachable store apart from missing credentials or a bad payload.
 */
use std::time::Duration;
use thiserror::Error;

/// Reasons a query or emission against the event store did not succeed
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// No credential is configured for the operation
    #[error("no credential configured for {0}")]
    MissingCredentials(&'static str),

    /// The project identifier could not be resolved
    #[error("event store project id could not be resolved")]
    NamespaceUnresolved,

    /// The store did not answer in time
    #[error("event store did not answer within {0:?}")]
    Timeout(Duration),

    /// Connection, TLS or protocol failure
    #[error("event store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status (bad request, unauthorized, ...)
    #[error("event store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response did not have the expected shape
    #[error("malformed event store response: {0}")]
    MalformedResponse(String),
}

impl TelemetryError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Whether the failure is a credential problem rather than an outage
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::MissingCredentials(_) | Self::Status { status: 401 | 403, .. })
    }
}
