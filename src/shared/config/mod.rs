//! Application configuration module
//!
//! Provides the configuration types for the server and the observability
//! pipeline. Every field has a safe default; the only value whose absence
//! changes behavior is the ingestion key, without which nothing is sent to
//! the event store.
//!
//! Values are layered: defaults, then an optional TOML file, then
//! environment variables (see `backend::server::config::load_config`).

use serde::Deserialize;
use thiserror::Error;

use crate::shared::redact::{
    DEFAULT_MAX_REQUEST_BYTES, DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_SENSITIVE_FIELDS, DEFAULT_SENSITIVE_HEADERS,
};
use crate::shared::ring::DEFAULT_RING_CAPACITY;

/// Default event store host
pub const DEFAULT_STORE_HOST: &str = "https://app.posthog.com";

/// Key prefixes after which a purely numeric credential names its project
const NUMERIC_KEY_PREFIXES: &[&str] = &["phc_", "phx_"];

/// Observability pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Write/ingestion credential. `None` disables emission.
    pub ingest_key: Option<String>,
    /// Read-scope credential preferred for history queries
    pub query_key: Option<String>,
    /// Base URL of the event store
    pub host: String,
    /// Explicit project (namespace) identifier
    pub project_id: Option<String>,
    pub ring_capacity: usize,
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
    pub sensitive_fields: Vec<String>,
    pub sensitive_headers: Vec<String>,
    pub query_timeout_ms: u64,
    /// Restrict history lookups to the calling user's own events
    pub history_per_user: bool,
    pub max_stack_chars: usize,
    pub shutdown_drain_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            ingest_key: None,
            query_key: None,
            host: DEFAULT_STORE_HOST.to_string(),
            project_id: None,
            ring_capacity: DEFAULT_RING_CAPACITY,
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_response_body_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            sensitive_fields: DEFAULT_SENSITIVE_FIELDS.iter().map(|s| s.to_string()).collect(),
            sensitive_headers: DEFAULT_SENSITIVE_HEADERS.iter().map(|s| s.to_string()).collect(),
            query_timeout_ms: 3000,
            history_per_user: false,
            max_stack_chars: 1000,
            shutdown_drain_ms: 5000,
        }
    }
}

impl TelemetryConfig {
    /// Whether events are sent to the event store at all
    pub fn emission_enabled(&self) -> bool {
        self.ingest_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    /// Host without a trailing slash
    pub fn base_host(&self) -> &str {
        self.host.trim_end_matches('/')
    }

    /// Resolve the project identifier used in query and replay URLs.
    ///
    /// Explicit configuration wins. Otherwise a credential is only used when
    /// it is strictly numeric (optionally behind a known key prefix); anything
    /// else resolves to `None` rather than a guess.
    pub fn resolve_namespace(&self) -> Option<String> {
        if let Some(project_id) = self.project_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            return Some(project_id.to_string());
        }
        [self.query_key.as_deref(), self.ingest_key.as_deref()]
            .into_iter()
            .flatten()
            .find_map(numeric_project_from_key)
    }

    /// Add extra sensitive field names, keeping the defaults
    pub fn extend_sensitive_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.sensitive_fields, fields);
    }

    /// Add extra sensitive header names, keeping the defaults
    pub fn extend_sensitive_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_unique(&mut self.sensitive_headers, headers);
    }
}

fn extend_unique<I, S>(target: &mut Vec<String>, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    for value in values {
        let value: String = value.into();
        let value = value.trim().to_string();
        if !value.is_empty() && !target.iter().any(|existing| existing.eq_ignore_ascii_case(&value)) {
            target.push(value);
        }
    }
}

fn numeric_project_from_key(key: &str) -> Option<String> {
    let key = key.trim();
    let digits = NUMERIC_KEY_PREFIXES
        .iter()
        .find_map(|prefix| key.strip_prefix(prefix))
        .unwrap_or(key);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(digits.to_string())
    } else {
        None
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Port the HTTP server binds to
    pub server_port: u16,
    /// HS256 secret used to verify caller identity tokens
    pub jwt_secret: String,
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            jwt_secret: "change-me-in-production".to_string(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables read through `lookup`.
    ///
    /// Unparseable values are skipped and reported back so the caller can
    /// log them; the previous value stays in place.
    pub fn apply_env<F>(&mut self, lookup: F) -> Vec<ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();
        let telemetry = &mut self.telemetry;

        if let Some(value) = lookup("SERVER_PORT") {
            parse_into(&mut self.server_port, "SERVER_PORT", &value, &mut problems);
        }
        if let Some(value) = lookup("JWT_SECRET") {
            self.jwt_secret = value;
        }
        if let Some(value) = lookup("EVENT_STORE_API_KEY") {
            telemetry.ingest_key = non_blank(value);
        }
        if let Some(value) = lookup("EVENT_STORE_QUERY_KEY") {
            telemetry.query_key = non_blank(value);
        }
        if let Some(value) = lookup("EVENT_STORE_HOST").and_then(non_blank) {
            telemetry.host = value;
        }
        if let Some(value) = lookup("EVENT_STORE_PROJECT_ID") {
            telemetry.project_id = non_blank(value);
        }
        if let Some(value) = lookup("EVENT_RING_CAPACITY") {
            parse_into(&mut telemetry.ring_capacity, "EVENT_RING_CAPACITY", &value, &mut problems);
        }
        if let Some(value) = lookup("MAX_REQUEST_BODY_BYTES") {
            parse_into(&mut telemetry.max_request_body_bytes, "MAX_REQUEST_BODY_BYTES", &value, &mut problems);
        }
        if let Some(value) = lookup("MAX_RESPONSE_BODY_BYTES") {
            parse_into(&mut telemetry.max_response_body_bytes, "MAX_RESPONSE_BODY_BYTES", &value, &mut problems);
        }
        if let Some(value) = lookup("EVENT_STORE_QUERY_TIMEOUT_MS") {
            parse_into(&mut telemetry.query_timeout_ms, "EVENT_STORE_QUERY_TIMEOUT_MS", &value, &mut problems);
        }
        if let Some(value) = lookup("TRACK_HISTORY_PER_USER") {
            telemetry.history_per_user = matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(value) = lookup("SENSITIVE_FIELDS") {
            telemetry.extend_sensitive_fields(value.split(','));
        }
        if let Some(value) = lookup("SENSITIVE_HEADERS") {
            telemetry.extend_sensitive_headers(value.split(','));
        }

        problems
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let host = self.telemetry.host.trim();
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.telemetry.host.clone()));
        }
        Ok(())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_into<T: std::str::FromStr>(target: &mut T, key: &'static str, raw: &str, problems: &mut Vec<ConfigError>) {
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => problems.push(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server_port = port;
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn ingest_key(mut self, key: impl Into<String>) -> Self {
        self.config.telemetry.ingest_key = Some(key.into());
        self
    }

    pub fn query_key(mut self, key: impl Into<String>) -> Self {
        self.config.telemetry.query_key = Some(key.into());
        self
    }

    /// Set the event store host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.telemetry.host = host.into();
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.config.telemetry.project_id = Some(project_id.into());
        self
    }

    pub fn ring_capacity(mut self, capacity: usize) -> Self {
        self.config.telemetry.ring_capacity = capacity;
        self
    }

    pub fn query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.telemetry.query_timeout_ms = timeout_ms;
        self
    }

    pub fn history_per_user(mut self, enabled: bool) -> Self {
        self.config.telemetry.history_per_user = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
