/**
 * Error Funnel
 *
 * Single entry point for failure reporting, whatever the origin: handler
 * failures observed by the middleware (`api` / `backend`) and reports posted
 * by the client (`frontend`).
 *
 * Every captured failure becomes exactly one `ErrorEvent`:
 *
 * - the name defaults to `"Error"`
 * - the stack is cut to `max_stack_chars` characters
 * - the context goes through the redactor, field by field
 * - a session id yields a replay link `{host}/project/{id}/replay/{session}`,
 *   degraded to `{host}/replay/{session}` when the project id is unknown
 *
 * Details without a message are rejected; the funnel never invents an event.
 */
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::telemetry::store::EventStoreClient;
use crate::shared::error::SharedError;
use crate::shared::event::{ErrorDetails, ErrorEvent, ErrorSource, ERROR_EVENT_NAME};
use crate::shared::redact::{truncate_chars, Redactor};
use crate::shared::ring::{EventRing, RingBufferEntry};

/// Name used when a failure carries none
pub const DEFAULT_ERROR_NAME: &str = "Error";

pub struct ErrorFunnel {
    store: Arc<EventStoreClient>,
    ring: Arc<EventRing>,
    redactor: Arc<Redactor>,
    max_stack_chars: usize,
}

impl ErrorFunnel {
    pub fn new(store: Arc<EventStoreClient>, ring: Arc<EventRing>, redactor: Arc<Redactor>, max_stack_chars: usize) -> Self {
        Self {
            store,
            ring,
            redactor,
            max_stack_chars,
        }
    }

    /// Capture one failure: build the event, buffer it and send it.
    ///
    /// Returns `None` (and emits nothing) when `details` does not describe a
    /// failure.
    pub async fn capture_error(
        &self,
        source: ErrorSource,
        details: ErrorDetails,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Option<ErrorEvent> {
        let event = match self.build_event(source, details, user_id, session_id) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(error = %err, source = source.as_str(), "Ignoring error report without failure details");
                return None;
            }
        };

        let properties = event.to_properties();
        self.ring.append(RingBufferEntry::new(
            user_id,
            ERROR_EVENT_NAME,
            Value::Object(properties.clone()),
        ));

        if let Err(err) = self.store.emit(user_id, ERROR_EVENT_NAME, properties).await {
            tracing::warn!(error = %err, error_name = %event.error_name, "Failed to emit error event");
        }

        Some(event)
    }

    /// Normalize `details` into an `ErrorEvent` without sending it
    pub fn build_event(
        &self,
        source: ErrorSource,
        details: ErrorDetails,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<ErrorEvent, SharedError> {
        details.validate()?;

        let session_id = session_id.map(str::trim).filter(|s| !s.is_empty());
        let error_name = details
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_ERROR_NAME)
            .to_string();
        let context = match self.redactor.sanitize_context(details.context.as_ref()) {
            Some(Value::Object(map)) => Value::Object(map),
            Some(Value::Null) | None => json!({}),
            Some(other) => json!({ "value": other }),
        };

        Ok(ErrorEvent {
            error_name,
            error_message: details.message,
            error_stack: details.stack.map(|stack| truncate_chars(&stack, self.max_stack_chars)),
            error_type: source,
            user_id: user_id.to_string(),
            session_id: session_id.map(str::to_string),
            context,
            replay_url: session_id.map(|sid| self.replay_url(sid)),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Replay link for a client-side session recording
    pub fn replay_url(&self, session_id: &str) -> String {
        let host = self.store.host();
        match self.store.namespace() {
            Some(namespace) => format!("{host}/project/{namespace}/replay/{session_id}"),
            None => {
                tracing::warn!(session_id, "Project id unresolved, replay link will not name a project");
                format!("{host}/replay/{session_id}")
            }
        }
    }
}
