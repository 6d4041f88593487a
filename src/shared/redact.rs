/**
 * Payload Redaction
 *
 * Pure sanitizers applied to every payload before it is buffered locally or
 * transmitted to the event store.
 *
 * - `sanitize_body` replaces sensitive fields (case-insensitive key match, at
 *   any depth) with [`REDACTED`] and truncates payloads whose serialized form
 *   exceeds the request threshold.
 * - `sanitize_response` does the same with the larger response threshold.
 * - `sanitize_context` caps each top-level field of an error context.
 * - `sanitize_headers` replaces the values of sensitive headers.
 *
 * Oversized payloads are replaced by a marker object
 * `{"truncated": true, "size": <bytes>, "preview": "<first bytes>"}`.
 * Markers and redacted values pass through unchanged, so sanitizing twice
 * yields the same value as sanitizing once.
 */
use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::shared::config::TelemetryConfig;

/// Replacement written over sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Field names redacted by default
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "apiKey", "access_token"];

/// Header names redacted by default
pub const DEFAULT_SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-api-key", "x-session-id"];

/// Default serialized size limit for request bodies
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1000;

/// Default serialized size limit for response bodies
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 2000;

/// Sanitizer configured with the sensitive name sets and size thresholds
#[derive(Debug, Clone)]
pub struct Redactor {
    sensitive_fields: HashSet<String>,
    sensitive_headers: HashSet<String>,
    max_request_bytes: usize,
    max_response_bytes: usize,
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(
            DEFAULT_SENSITIVE_FIELDS.iter().copied(),
            DEFAULT_SENSITIVE_HEADERS.iter().copied(),
            DEFAULT_MAX_REQUEST_BYTES,
            DEFAULT_MAX_RESPONSE_BYTES,
        )
    }
}

impl Redactor {
    /// Build a redactor from explicit name sets and thresholds.
    ///
    /// Names are matched case-insensitively.
    pub fn new<'a>(
        sensitive_fields: impl IntoIterator<Item = &'a str>,
        sensitive_headers: impl IntoIterator<Item = &'a str>,
        max_request_bytes: usize,
        max_response_bytes: usize,
    ) -> Self {
        Self {
            sensitive_fields: sensitive_fields.into_iter().map(str::to_lowercase).collect(),
            sensitive_headers: sensitive_headers.into_iter().map(str::to_lowercase).collect(),
            max_request_bytes,
            max_response_bytes,
        }
    }

    /// Build a redactor from the telemetry configuration
    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            config.sensitive_fields.iter().map(String::as_str),
            config.sensitive_headers.iter().map(String::as_str),
            config.max_request_body_bytes,
            config.max_response_body_bytes,
        )
    }

    /// Whether `key` names a sensitive body field
    pub fn is_sensitive_field(&self, key: &str) -> bool {
        self.sensitive_fields.contains(&key.to_lowercase())
    }

    /// Whether `name` names a sensitive header
    pub fn is_sensitive_header(&self, name: &str) -> bool {
        self.sensitive_headers.contains(&name.to_lowercase())
    }

    /// Sanitize a request body (or any free-form context map).
    ///
    /// Absent input stays absent.
    pub fn sanitize_body(&self, body: Option<&Value>) -> Option<Value> {
        let body = body?;
        if is_truncation_marker(body) {
            return Some(body.clone());
        }
        let redacted = self.redact_value(body);
        Some(truncate_value(redacted, self.max_request_bytes))
    }

    /// Sanitize an error context map.
    ///
    /// Redacts like `sanitize_body`, but the size limit applies to each
    /// top-level field on its own, so route fields stay addressable when a
    /// large body or header set sits next to them.
    pub fn sanitize_context(&self, context: Option<&Value>) -> Option<Value> {
        match context? {
            Value::Object(map) => Some(Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        let value = if self.is_sensitive_field(key) {
                            Value::String(REDACTED.to_string())
                        } else if is_truncation_marker(value) {
                            value.clone()
                        } else {
                            truncate_value(self.redact_value(value), self.max_request_bytes)
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            )),
            other => self.sanitize_body(Some(other)),
        }
    }

    /// Sanitize a response body using the response threshold
    pub fn sanitize_response(&self, body: Option<&Value>) -> Option<Value> {
        let body = body?;
        if is_truncation_marker(body) {
            return Some(body.clone());
        }
        let redacted = self.redact_value(body);
        Some(truncate_value(redacted, self.max_response_bytes))
    }

    /// Sanitize header pairs into a JSON object keyed by lowercase header name
    pub fn sanitize_headers<'a>(&self, headers: impl IntoIterator<Item = (&'a str, &'a str)>) -> Value {
        let mut sanitized = Map::new();
        for (name, value) in headers {
            let name = name.to_lowercase();
            let value = if self.sensitive_headers.contains(&name) {
                REDACTED.to_string()
            } else {
                value.to_string()
            };
            sanitized.insert(name, Value::String(value));
        }
        Value::Object(sanitized)
    }

    fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        let value = if self.is_sensitive_field(key) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.redact_value(value)
                        };
                        (key.clone(), value)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact_value(item)).collect()),
            other => other.clone(),
        }
    }
}

/// Whether `value` is a marker produced by truncation
pub fn is_truncation_marker(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            map.len() == 3
                && map.get("truncated") == Some(&Value::Bool(true))
                && map.get("size").is_some_and(Value::is_u64)
                && map.get("preview").is_some_and(Value::is_string)
        }
        None => false,
    }
}

/// Truncate `text` to at most `max_bytes` bytes without splitting a character
pub fn truncate_text(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Truncate `text` to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn truncate_value(value: Value, max_bytes: usize) -> Value {
    let serialized = match serde_json::to_string(&value) {
        Ok(serialized) => serialized,
        Err(_) => return value,
    };
    if serialized.len() <= max_bytes {
        return value;
    }
    json!({
        "truncated": true,
        "size": serialized.len(),
        "preview": truncate_text(&serialized, max_bytes),
    })
}
