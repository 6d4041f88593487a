/**
 * Event Store Client
 *
 * HTTP client for the remote, eventually-consistent event store. It has two
 * jobs:
 *
 * - **Ingestion**: `emit` posts one event to `{host}/capture/`, stamped with
 *   a fresh UUID so the stored copy can be referenced later.
 * - **History**: `previous_call` finds the most recent write event for an
 *   endpoint key.
 *
 * # History lookup
 *
 * Lookups run a chain of query tiers:
 *
 * 1. `Structured` - `POST {host}/api/projects/{id}/query/` with an events
 *    query (event name, property predicates, newest first, limit 1).
 * 2. `EventList` - `GET {host}/api/projects/{id}/events/` with the same
 *    filters as query-string parameters.
 *
 * The first tier yielding a record wins. A tier that fails or finds nothing
 * hands over to the next one; a timeout ends the chain. Exhausting the chain
 * yields `None`. Lookups never return an error to the caller.
 *
 * # Credentials
 *
 * Queries prefer the read-scope query key. When only the ingestion key is
 * configured it is used instead and a degraded-mode warning is logged once.
 * The project id comes from `TelemetryConfig::resolve_namespace`; when it
 * cannot be resolved, lookups are skipped.
 */
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backend::telemetry::error::TelemetryError;
use crate::shared::config::TelemetryConfig;
use crate::shared::event::{CallRecord, WRITE_EVENT_NAME};
use crate::shared::redact::truncate_text;

/// Upper bound for ingestion requests
const EMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// One step of the history lookup chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTier {
    Structured,
    EventList,
}

impl QueryTier {
    pub const CHAIN: [QueryTier; 2] = [QueryTier::Structured, QueryTier::EventList];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::EventList => "event-list",
        }
    }
}

/// Filters for one history lookup
#[derive(Debug, Clone, Copy)]
pub struct HistoryQuery<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub distinct_id: Option<&'a str>,
}

impl HistoryQuery<'_> {
    fn property_filters(&self) -> Value {
        json!([
            {"key": "method", "value": self.method, "operator": "exact", "type": "event"},
            {"key": "path", "value": self.path, "operator": "exact", "type": "event"},
        ])
    }
}

/// Client for the remote event store
#[derive(Debug)]
pub struct EventStoreClient {
    http: reqwest::Client,
    host: String,
    ingest_key: Option<String>,
    query_key: Option<String>,
    namespace: Option<String>,
    query_timeout: Duration,
    degraded_warned: AtomicBool,
}

impl EventStoreClient {
    pub fn new(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let http = reqwest::Client::builder().timeout(EMIT_TIMEOUT).build()?;
        let non_blank = |key: &Option<String>| key.as_deref().map(str::trim).filter(|k| !k.is_empty()).map(str::to_string);

        Ok(Self {
            http,
            host: config.base_host().to_string(),
            ingest_key: non_blank(&config.ingest_key),
            query_key: non_blank(&config.query_key),
            namespace: config.resolve_namespace(),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            degraded_warned: AtomicBool::new(false),
        })
    }

    /// Store host without trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolved project identifier, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn emission_enabled(&self) -> bool {
        self.ingest_key.is_some()
    }

    /// Send one event to the store.
    ///
    /// Without an ingestion key this is a no-op returning `Ok(())`.
    pub async fn emit(&self, distinct_id: &str, event: &str, properties: Map<String, Value>) -> Result<(), TelemetryError> {
        let Some(api_key) = self.ingest_key.as_deref() else {
            tracing::debug!(event, "Ingestion key not configured, skipping emission");
            return Ok(());
        };

        let payload = json!({
            "api_key": api_key,
            "uuid": uuid::Uuid::new_v4(),
            "event": event,
            "distinct_id": distinct_id,
            "properties": properties,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let response = self
            .http
            .post(format!("{}/capture/", self.host))
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;

        tracing::debug!(event, distinct_id, "Event emitted");
        Ok(())
    }

    /// Most recent write event for `method path`, or `None`.
    ///
    /// Every failure mode (missing credentials, unresolved project, bad
    /// responses, timeouts, no match) resolves to `None` with a log line.
    pub async fn previous_call(&self, method: &str, path: &str, distinct_id: Option<&str>) -> Option<CallRecord> {
        let query = HistoryQuery {
            method,
            path,
            distinct_id,
        };

        let (key, namespace) = match self.query_credential().and_then(|key| Ok((key, self.query_namespace()?))) {
            Ok(target) => target,
            Err(err @ TelemetryError::MissingCredentials(_)) => {
                tracing::debug!(method, path, error = %err, "History lookup skipped");
                return None;
            }
            Err(err) => {
                tracing::warn!(method, path, error = %err, "History lookup skipped; set EVENT_STORE_PROJECT_ID");
                return None;
            }
        };

        for tier in QueryTier::CHAIN {
            match self.run_tier(tier, &query, key, namespace).await {
                Ok(Some(record)) => {
                    tracing::debug!(tier = tier.as_str(), method, path, "Previous call found");
                    return Some(record);
                }
                Ok(None) => {
                    tracing::debug!(tier = tier.as_str(), method, path, "No previous call in tier");
                }
                Err(err @ TelemetryError::Timeout(_)) => {
                    tracing::warn!(tier = tier.as_str(), method, path, error = %err, "History lookup timed out, treating as first call");
                    return None;
                }
                Err(err) if err.is_auth_failure() => {
                    tracing::warn!(tier = tier.as_str(), method, path, error = %err, "History query rejected, credentials may lack read scope");
                }
                Err(err) => {
                    tracing::warn!(tier = tier.as_str(), method, path, error = %err, "History query tier failed");
                }
            }
        }

        None
    }

    /// Run a single tier with the query timeout applied
    pub async fn run_tier(
        &self,
        tier: QueryTier,
        query: &HistoryQuery<'_>,
        key: &str,
        namespace: &str,
    ) -> Result<Option<CallRecord>, TelemetryError> {
        let lookup = async {
            match tier {
                QueryTier::Structured => self.structured_query(query, key, namespace).await,
                QueryTier::EventList => self.list_query(query, key, namespace).await,
            }
        };

        let record = tokio::time::timeout(self.query_timeout, lookup)
            .await
            .map_err(|_| TelemetryError::Timeout(self.query_timeout))??;

        // the store's filters are trusted only as far as they match
        Ok(record.filter(|r| r.method.eq_ignore_ascii_case(query.method) && r.path == query.path))
    }

    fn query_credential(&self) -> Result<&str, TelemetryError> {
        if let Some(key) = self.query_key.as_deref() {
            return Ok(key);
        }
        let key = self
            .ingest_key
            .as_deref()
            .ok_or(TelemetryError::MissingCredentials("history query"))?;
        if !self.degraded_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "No query key configured, querying event history with the ingestion key; \
                 history lookups may fail without read scope (set EVENT_STORE_QUERY_KEY)"
            );
        }
        Ok(key)
    }

    fn query_namespace(&self) -> Result<&str, TelemetryError> {
        self.namespace.as_deref().ok_or(TelemetryError::NamespaceUnresolved)
    }

    async fn structured_query(
        &self,
        query: &HistoryQuery<'_>,
        key: &str,
        namespace: &str,
    ) -> Result<Option<CallRecord>, TelemetryError> {
        let mut events_query = json!({
            "kind": "EventsQuery",
            "select": ["*"],
            "event": WRITE_EVENT_NAME,
            "properties": query.property_filters(),
            "orderBy": ["timestamp DESC"],
            "limit": 1,
        });
        if let Some(distinct_id) = query.distinct_id {
            events_query["distinctId"] = Value::String(distinct_id.to_string());
        }

        let response = map_timeout(
            self.http
                .post(format!("{}/api/projects/{}/query/", self.host, namespace))
                .bearer_auth(key)
                .json(&json!({ "query": events_query }))
                .send()
                .await,
            self.query_timeout,
        )?;
        let body = ensure_success(response).await?;
        parse_first_event(&body)
    }

    async fn list_query(
        &self,
        query: &HistoryQuery<'_>,
        key: &str,
        namespace: &str,
    ) -> Result<Option<CallRecord>, TelemetryError> {
        let mut params = vec![
            ("event", WRITE_EVENT_NAME.to_string()),
            ("properties", query.property_filters().to_string()),
            ("orderBy", json!(["-timestamp"]).to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(distinct_id) = query.distinct_id {
            params.push(("distinct_id", distinct_id.to_string()));
        }

        let response = map_timeout(
            self.http
                .get(format!("{}/api/projects/{}/events/", self.host, namespace))
                .bearer_auth(key)
                .query(&params)
                .send()
                .await,
            self.query_timeout,
        )?;
        let body = ensure_success(response).await?;
        parse_first_event(&body)
    }
}

fn map_timeout(result: Result<reqwest::Response, reqwest::Error>, limit: Duration) -> Result<reqwest::Response, TelemetryError> {
    result.map_err(|err| {
        if err.is_timeout() {
            TelemetryError::Timeout(limit)
        } else {
            TelemetryError::Transport(err)
        }
    })
}

/// Turn a non-success response into `TelemetryError::Status`, else read its body
async fn ensure_success(response: reqwest::Response) -> Result<String, TelemetryError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(TelemetryError::Status {
            status: status.as_u16(),
            body: truncate_text(&body, 200).to_string(),
        })
    }
}

/// Extract the first event of a query response.
///
/// `results` rows are either event objects or arrays whose first column is
/// the event object. An empty `results` array means "not found".
pub fn parse_first_event(body: &str) -> Result<Option<CallRecord>, TelemetryError> {
    let value: Value = serde_json::from_str(body).map_err(|e| TelemetryError::malformed(e.to_string()))?;
    let results = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| TelemetryError::malformed("response has no results array"))?;

    let Some(row) = results.first() else {
        return Ok(None);
    };
    let event = match row {
        Value::Array(columns) => columns
            .first()
            .filter(|c| c.is_object())
            .ok_or_else(|| TelemetryError::malformed("result row has no event column"))?,
        Value::Object(_) => row,
        _ => return Err(TelemetryError::malformed("result row is neither an object nor an array")),
    };

    record_from_event(event).map(Some)
}

fn record_from_event(event: &Value) -> Result<CallRecord, TelemetryError> {
    let text = |key: &str| event.get(key).and_then(Value::as_str);
    let properties = event
        .get("properties")
        .ok_or_else(|| TelemetryError::malformed("event has no properties"))?;

    CallRecord::from_stored(
        properties,
        text("timestamp"),
        text("distinct_id"),
        text("id").or_else(|| text("uuid")),
    )
    .map_err(|e| TelemetryError::malformed(e.to_string()))
}
