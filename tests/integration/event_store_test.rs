//! Event store integration tests
//!
//! A wiremock server stands in for the remote event store: query tiers,
//! fallbacks, timeouts, credentials and ingestion payloads.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    events_named, LogCapture, store_config, store_telemetry_config, stored_write_event, test_server, INGEST_KEY, PROJECT_ID,
    QUERY_KEY,
};
use itemtrail::backend::telemetry::{EventStoreClient, WriteTracker};
use itemtrail::shared::config::TelemetryConfig;
use itemtrail::shared::event::CallRecord;
use itemtrail::shared::ring::EventRing;

fn query_path() -> String {
    format!("/api/projects/{PROJECT_ID}/query/")
}

fn events_path() -> String {
    format!("/api/projects/{PROJECT_ID}/events/")
}

fn client(config: &TelemetryConfig) -> EventStoreClient {
    EventStoreClient::new(config).expect("client builds")
}

#[tokio::test]
async fn test_structured_tier_finds_previous_call() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .and(header("authorization", format!("Bearer {QUERY_KEY}").as_str()))
        .and(body_partial_json(json!({"query": {"kind": "EventsQuery", "event": "api_write_request", "limit": 1}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [[stored_write_event("POST", "/api/items", json!({"name": "Old Item"})), "api_write_request"]]
        })))
        .expect(1)
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("POST", "/api/items", None)
        .await
        .expect("previous call found");
    assert_eq!(previous.request_body, Some(json!({"name": "Old Item"})));
    assert_eq!(previous.event_id.as_deref(), Some("evt-previous"));
    assert_eq!(previous.timestamp, "2024-05-01T10:00:00Z");
}

#[tokio::test]
async fn test_rejected_structured_query_falls_back_to_event_list() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(400).set_body_string("unsupported query kind"))
        .expect(1)
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path(events_path()))
        .and(query_param("event", "api_write_request"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [stored_write_event("PUT", "/api/items/1", json!({"name": "A"}))]
        })))
        .expect(1)
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("PUT", "/api/items/1", None)
        .await;
    assert_eq!(previous.map(|p| p.request_body), Some(Some(json!({"name": "A"}))));
}

#[tokio::test]
async fn test_empty_structured_result_falls_through() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path(events_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [stored_write_event("POST", "/api/items", json!({"name": "late"}))]
        })))
        .expect(1)
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("POST", "/api/items", None)
        .await;
    assert!(previous.is_some());
}

#[tokio::test]
async fn test_mismatched_record_is_ignored() {
    let store = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [stored_write_event("POST", "/api/other", json!({}))]
        })))
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("POST", "/api/items", None)
        .await;
    assert!(previous.is_none());
}

#[tokio::test]
async fn test_all_tiers_failing_means_no_history() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path(events_path()))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .expect(1)
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("POST", "/api/items", None)
        .await;
    assert!(previous.is_none());
}

#[tokio::test]
async fn test_timeout_ends_the_chain() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path(events_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&store)
        .await;

    let config = TelemetryConfig {
        query_timeout_ms: 50,
        ..store_telemetry_config(&store.uri())
    };
    let logs = LogCapture::default();
    let _guard = logs.install();
    assert!(client(&config).previous_call("POST", "/api/items", None).await.is_none());

    let output = logs.contents();
    assert!(output.contains("WARN"), "no warning logged: {output}");
    assert!(output.contains("History lookup timed out"), "no timeout warning: {output}");
    assert!(output.contains("structured"), "tier missing from warning: {output}");
}

#[tokio::test]
async fn test_timed_out_lookup_still_emits_first_call() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&store)
        .await;
    Mock::given(method("POST"))
        .and(path("/capture/"))
        .and(body_partial_json(json!({
            "event": "api_write_request",
            "properties": {"is_first_call": true}
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&store)
        .await;

    let config = TelemetryConfig {
        query_timeout_ms: 50,
        ..store_telemetry_config(&store.uri())
    };
    let ring = Arc::new(EventRing::new(10));
    let tracker = WriteTracker::new(Arc::new(client(&config)), Arc::clone(&ring), false);

    let event = tracker
        .track_write(CallRecord::new("POST", "/api/items").with_request_body(Some(json!({"name": "x"}))))
        .await
        .expect("write tracked");
    assert!(event.is_first_call);
    assert!(event.previous.is_none());
    assert_eq!(ring.len(), 1);
}

#[tokio::test]
async fn test_ingest_key_is_used_when_no_query_key() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/projects/31/query/"))
        .and(header("authorization", "Bearer phc_31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [stored_write_event("POST", "/api/items", json!({"n": 1}))]
        })))
        .expect(1)
        .mount(&store)
        .await;

    let config = TelemetryConfig {
        host: store.uri(),
        ingest_key: Some("phc_31".into()),
        ..TelemetryConfig::default()
    };
    let client = client(&config);
    assert_eq!(client.namespace(), Some("31"));
    assert!(client.previous_call("POST", "/api/items", None).await.is_some());
}

#[tokio::test]
async fn test_unresolved_project_skips_lookup() {
    let store = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&store)
        .await;

    let config = TelemetryConfig {
        host: store.uri(),
        ingest_key: Some("phc_not_numeric".into()),
        ..TelemetryConfig::default()
    };
    let logs = LogCapture::default();
    let _guard = logs.install();
    assert!(client(&config).previous_call("POST", "/api/items", None).await.is_none());
    assert!(logs.contents().contains("project id could not be resolved"));
}

#[tokio::test]
async fn test_history_scoped_per_user() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .and(body_partial_json(json!({"query": {"distinctId": "user-5"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&store)
        .await;
    Mock::given(method("GET"))
        .and(path(events_path()))
        .and(query_param("distinct_id", "user-5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(1)
        .mount(&store)
        .await;

    let previous = client(&store_telemetry_config(&store.uri()))
        .previous_call("POST", "/api/items", Some("user-5"))
        .await;
    assert!(previous.is_none());
}

#[tokio::test]
async fn test_emit_payload() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/capture/"))
        .and(body_partial_json(json!({
            "api_key": INGEST_KEY,
            "event": "api_error",
            "distinct_id": "user-1",
            "properties": {"error_message": "boom"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .expect(1)
        .mount(&store)
        .await;

    let mut properties = serde_json::Map::new();
    properties.insert("error_message".into(), Value::String("boom".into()));
    client(&store_telemetry_config(&store.uri()))
        .emit("user-1", "api_error", properties)
        .await
        .expect("emitted");
}

#[tokio::test]
async fn test_emit_failure_is_reported() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/capture/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&store)
        .await;

    let err = client(&store_telemetry_config(&store.uri()))
        .emit("user-1", "api_error", serde_json::Map::new())
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_changed_resubmission_end_to_end() {
    let store = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(query_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [[stored_write_event("POST", "/api/items", json!({"name": "Old Item"}))]]
        })))
        .mount(&store)
        .await;
    Mock::given(method("POST"))
        .and(path("/capture/"))
        .and(body_partial_json(json!({"event": "api_write_request"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&store)
        .await;

    let (server, telemetry) = test_server(store_config(&store.uri()));
    let response = server.post("/api/items").json(&json!({"name": "New Item"})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let writes = events_named(&telemetry, "api_write_request").await;
    assert_eq!(writes.len(), 1);
    let props = &writes[0].properties;
    assert_eq!(props["is_first_call"], false);
    assert_eq!(props["previous_event_id"], "evt-previous");
    assert_eq!(props["previous"]["request_body"], json!({"name": "Old Item"}));
    assert!(props["change_summary"].as_str().unwrap().starts_with("Request body changed"));
    assert_eq!(
        props["diff"]["children"]["request_body"]["children"]["name"],
        json!({"type": "changed", "previous": "Old Item", "current": "New Item"})
    );
}

#[tokio::test]
async fn test_store_outage_never_changes_the_response() {
    let store = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .mount(&store)
        .await;

    let (server, telemetry) = test_server(store_config(&store.uri()));
    let response = server.post("/api/items").json(&json!({"name": "Resilient"})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["name"], "Resilient");

    let writes = events_named(&telemetry, "api_write_request").await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].properties["is_first_call"], true);
}
