/**
 * Telemetry Event Types
 *
 * This module defines the records produced by the observability pipeline:
 *
 * - `CallRecord` - one successful mutating API call
 * - `EnrichedWriteEvent` - a call record joined with its predecessor and diff
 * - `ErrorEvent` - one captured failure, from any origin
 *
 * All of them are immutable once built. They are serialized into flat
 * property maps for the event store, and `CallRecord` can be rebuilt from the
 * properties of a stored event.
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::shared::diff::DiffNode;
use crate::shared::error::SharedError;

/// Event name for enriched write events
pub const WRITE_EVENT_NAME: &str = "api_write_request";

/// Event name for error events
pub const ERROR_EVENT_NAME: &str = "api_error";

/// Identity used when no authenticated caller is known
pub const ANONYMOUS_USER: &str = "anonymous";

/// Summary used when there is no previous record
pub const FIRST_CALL_SUMMARY: &str = "First call to this endpoint";

/// Summary used when a previous record exists but nothing differs
pub const NO_CHANGES_SUMMARY: &str = "No changes detected";

/// One mutating API call, as seen by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub method: String,
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub response_body: Option<Value>,
    #[serde(default)]
    pub request_headers: Option<Value>,
    pub status_code: u16,
    pub duration_ms: u64,
    pub timestamp: String,
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

impl CallRecord {
    /// Start a record for `method path`, stamped now, owned by the anonymous user
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let method: String = method.into();
        let path = path.into();
        Self {
            method: method.to_uppercase(),
            url: path.clone(),
            path,
            request_body: None,
            response_body: None,
            request_headers: None,
            status_code: 200,
            duration_ms: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: ANONYMOUS_USER.to_string(),
            session_id: None,
            event_id: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_request_body(mut self, body: Option<Value>) -> Self {
        self.request_body = body;
        self
    }

    pub fn with_response_body(mut self, body: Option<Value>) -> Self {
        self.response_body = body;
        self
    }

    pub fn with_request_headers(mut self, headers: Value) -> Self {
        self.request_headers = Some(headers);
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Endpoint key used for history lookups
    pub fn endpoint_key(&self) -> (&str, &str) {
        (&self.method, &self.path)
    }

    /// Flat property map written to the event store
    pub fn to_properties(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Rebuild a record from a stored event.
    ///
    /// `properties` may be an object or a JSON-encoded object string. The
    /// event's own id, timestamp and distinct id fill in whatever the
    /// properties lack.
    pub fn from_stored(
        properties: &Value,
        timestamp: Option<&str>,
        distinct_id: Option<&str>,
        event_id: Option<&str>,
    ) -> Result<Self, SharedError> {
        let properties = match properties {
            Value::String(raw) => serde_json::from_str::<Value>(raw)?,
            other => other.clone(),
        };
        let props = properties
            .as_object()
            .ok_or_else(|| SharedError::validation("properties", "stored properties are not an object"))?;

        let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
        let body = |key: &str| props.get(key).filter(|v| !v.is_null()).cloned();

        let method = text("method").ok_or_else(|| SharedError::validation("method", "missing from stored event"))?;
        let path = text("path").ok_or_else(|| SharedError::validation("path", "missing from stored event"))?;

        Ok(Self {
            url: text("url").unwrap_or_else(|| path.clone()),
            method,
            path,
            request_body: body("request_body"),
            response_body: body("response_body"),
            request_headers: body("request_headers"),
            status_code: props
                .get("status_code")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .unwrap_or(200),
            duration_ms: props.get("duration_ms").and_then(Value::as_u64).unwrap_or(0),
            timestamp: timestamp
                .map(str::to_string)
                .or_else(|| text("timestamp"))
                .unwrap_or_default(),
            user_id: distinct_id
                .map(str::to_string)
                .or_else(|| text("user_id"))
                .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
            session_id: text("session_id"),
            event_id: event_id.map(str::to_string).or_else(|| text("event_id")),
        })
    }
}

/// A write call joined with the previous call to the same endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedWriteEvent {
    pub current: CallRecord,
    pub previous: Option<CallRecord>,
    pub diff: Option<DiffNode>,
    pub is_first_call: bool,
    pub change_summary: String,
}

impl EnrichedWriteEvent {
    /// Property map for the event store: the current record's fields at the
    /// top level, enrichment alongside.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut properties = self.current.to_properties();
        properties.insert("is_first_call".into(), Value::Bool(self.is_first_call));
        properties.insert("change_summary".into(), Value::String(self.change_summary.clone()));
        properties.insert(
            "diff".into(),
            self.diff.as_ref().map(DiffNode::to_value).unwrap_or(Value::Null),
        );
        match &self.previous {
            Some(previous) => {
                properties.insert("previous".into(), Value::Object(previous.to_properties()));
                properties.insert(
                    "previous_event_id".into(),
                    previous.event_id.clone().map(Value::String).unwrap_or(Value::Null),
                );
                properties.insert("previous_timestamp".into(), Value::String(previous.timestamp.clone()));
            }
            None => {
                properties.insert("previous".into(), Value::Null);
            }
        }
        properties
    }
}

/// Where a failure was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Frontend,
    Backend,
    Api,
}

impl ErrorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Api => "api",
        }
    }
}

/// Raw failure details handed to the error funnel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Reject details that do not describe a failure
    pub fn validate(&self) -> Result<(), SharedError> {
        if self.message.trim().is_empty() {
            return Err(SharedError::validation("message", "error details need a message"));
        }
        Ok(())
    }
}

/// One captured failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub error_name: String,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub error_type: ErrorSource,
    pub user_id: String,
    pub session_id: Option<String>,
    pub context: Value,
    pub replay_url: Option<String>,
    pub timestamp: String,
}

impl ErrorEvent {
    pub fn to_properties(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
