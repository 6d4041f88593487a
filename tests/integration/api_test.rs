//! Item API integration tests
//!
//! Drive the full router and check what the observability pipeline records
//! for each kind of call.

#[path = "../common/mod.rs"]
mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{events_named, offline_config, test_server, FLUSH, JWT_SECRET};
use itemtrail::backend::auth::create_token;

const WRITE: &str = "api_write_request";
const ERROR: &str = "api_error";

fn session(id: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static("x-session-id"), HeaderValue::from_static(id))
}

#[tokio::test]
async fn test_first_write_is_tracked() {
    let (server, telemetry) = test_server(offline_config());

    let response = server.post("/api/items").json(&json!({"name": "Widget"})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let item: Value = response.json();
    assert_eq!(item["name"], "Widget");

    let writes = events_named(&telemetry, WRITE).await;
    assert_eq!(writes.len(), 1);
    let props = &writes[0].properties;
    assert_eq!(props["method"], "POST");
    assert_eq!(props["path"], "/api/items");
    assert_eq!(props["status_code"], 201);
    assert_eq!(props["is_first_call"], true);
    assert_eq!(props["previous"], Value::Null);
    assert_eq!(props["change_summary"], "First call to this endpoint");
    assert_eq!(props["request_body"], json!({"name": "Widget"}));
    assert_eq!(props["response_body"]["id"], item["id"]);
    assert_eq!(writes[0].distinct_id, "anonymous");
}

#[tokio::test]
async fn test_tracked_payloads_are_redacted() {
    let (server, telemetry) = test_server(offline_config());
    let token = create_token("user-42", JWT_SECRET).unwrap();

    let response = server
        .post("/api/items")
        .add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .json(&json!({"name": "Secret box", "password": "hunter2", "meta": {"token": "abc"}}))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let writes = events_named(&telemetry, WRITE).await;
    assert_eq!(writes.len(), 1);
    let props = &writes[0].properties;
    assert_eq!(writes[0].distinct_id, "user-42");
    assert_eq!(props["user_id"], "user-42");
    assert_eq!(props["request_body"]["password"], "[REDACTED]");
    assert_eq!(props["request_body"]["meta"]["token"], "[REDACTED]");
    assert_eq!(props["request_body"]["name"], "Secret box");
    assert_eq!(props["request_headers"]["authorization"], "[REDACTED]");
}

#[tokio::test]
async fn test_updates_are_tracked_per_path() {
    let (server, telemetry) = test_server(offline_config());

    let created: Value = server.post("/api/items").json(&json!({"name": "Old Item"})).await.json();
    let path = format!("/api/items/{}", created["id"]);
    assert!(telemetry.flush(FLUSH).await);

    let response = server.put(&path).json(&json!({"name": "New Item"})).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(telemetry.flush(FLUSH).await);
    let response = server.patch(&path).json(&json!({"description": "shiny"})).await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let writes = events_named(&telemetry, WRITE).await;
    let methods: Vec<&str> = writes.iter().filter_map(|e| e.properties["method"].as_str()).collect();
    assert_eq!(methods, vec!["POST", "PUT", "PATCH"]);
    assert_eq!(writes[1].properties["path"], path.as_str());
}

#[tokio::test]
async fn test_reads_and_deletes_are_not_tracked() {
    let (server, telemetry) = test_server(offline_config());
    let created: Value = server.post("/api/items").json(&json!({"name": "Temp"})).await.json();
    let path = format!("/api/items/{}", created["id"]);

    assert_eq!(server.get("/api/items").await.status_code(), StatusCode::OK);
    assert_eq!(server.get(&path).await.status_code(), StatusCode::OK);
    assert_eq!(server.delete(&path).await.status_code(), StatusCode::NO_CONTENT);

    let writes = events_named(&telemetry, WRITE).await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].properties["method"], "POST");
    assert!(events_named(&telemetry, ERROR).await.is_empty());
}

#[tokio::test]
async fn test_not_found_produces_one_error_event() {
    let (server, telemetry) = test_server(offline_config());

    let response = server.put("/api/items/99").json(&json!({"name": "Ghost"})).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body, json!({"error": "item 99 not found", "status": 404}));

    let errors = events_named(&telemetry, ERROR).await;
    assert_eq!(errors.len(), 1);
    let props = &errors[0].properties;
    assert_eq!(props["error_type"], "api");
    assert_eq!(props["error_name"], "NotFoundError");
    assert_eq!(props["error_message"], "item 99 not found");
    assert_eq!(props["context"]["status_code"], 404);
    assert_eq!(props["context"]["path"], "/api/items/99");
    assert_eq!(props["context"]["request_body"], json!({"name": "Ghost"}));
    assert!(events_named(&telemetry, WRITE).await.is_empty());
}

#[tokio::test]
async fn test_large_failing_request_keeps_route_context() {
    let (server, telemetry) = test_server(offline_config());

    let response = server
        .put("/api/items/99")
        .add_header(
            HeaderName::from_static("user-agent"),
            HeaderValue::from_static("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36"),
        )
        .add_header(
            HeaderName::from_static("accept-language"),
            HeaderValue::from_static("en-GB,en;q=0.9,de;q=0.8,fr;q=0.7,es;q=0.6,it;q=0.5,nl;q=0.4"),
        )
        .json(&json!({"name": "Ghost", "description": "d".repeat(2000)}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let errors = events_named(&telemetry, ERROR).await;
    assert_eq!(errors.len(), 1);
    let context = &errors[0].properties["context"];
    assert_eq!(context["path"], "/api/items/99");
    assert_eq!(context["method"], "PUT");
    assert_eq!(context["status_code"], 404);
    assert!(context["request_headers"]["user-agent"].as_str().unwrap().starts_with("Mozilla"));
    assert_eq!(context["request_body"]["truncated"], true);
}

#[tokio::test]
async fn test_validation_and_conflict_errors() {
    let (server, telemetry) = test_server(offline_config());

    let response = server.post("/api/items").json(&json!({"name": "  "})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    server.post("/api/items").json(&json!({"name": "Unique"})).await;
    let response = server.post("/api/items").json(&json!({"name": "unique"})).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let errors = events_named(&telemetry, ERROR).await;
    let mut names: Vec<&str> = errors.iter().filter_map(|e| e.properties["error_name"].as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["ConflictError", "ValidationError"]);
    assert_eq!(events_named(&telemetry, WRITE).await.len(), 1);
}

#[tokio::test]
async fn test_rejected_body_is_captured_without_failure_details() {
    let (server, telemetry) = test_server(offline_config());

    let response = server.post("/api/items").text("not json").await;
    assert!(response.status_code().is_client_error());

    let errors = events_named(&telemetry, ERROR).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].properties["error_name"], "HttpError");
    assert_eq!(errors[0].properties["context"]["request_body"], "not json");
}

#[tokio::test]
async fn test_session_id_links_replay() {
    let (server, telemetry) = test_server(offline_config());
    let (name, value) = session("sess-9");

    let response = server.delete("/api/items/5").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let errors = events_named(&telemetry, ERROR).await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].properties["session_id"], "sess-9");
    assert_eq!(errors[0].properties["replay_url"], "https://app.posthog.com/project/1/replay/sess-9");
    assert_eq!(errors[0].properties["context"]["request_headers"]["x-session-id"], "[REDACTED]");
}

#[tokio::test]
async fn test_write_event_carries_session_id() {
    let (server, telemetry) = test_server(offline_config());
    let (name, value) = session("sess-w");

    let response = server.post("/api/items").add_header(name, value).json(&json!({"name": "Tracked"})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let writes = events_named(&telemetry, WRITE).await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].properties["session_id"], "sess-w");
    assert_eq!(writes[0].properties["request_headers"]["x-session-id"], "[REDACTED]");
}

#[tokio::test]
async fn test_client_error_report() {
    let (server, telemetry) = test_server(offline_config());
    let (name, value) = session("browser-1");

    let response = server
        .post("/api/errors")
        .add_header(name, value)
        .json(&json!({
            "name": "TypeError",
            "message": "x is undefined",
            "stack": "at render (app.js:1:1)",
            "context": {"component": "ItemList", "apiKey": "k"}
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    let errors = events_named(&telemetry, ERROR).await;
    assert_eq!(errors.len(), 1);
    let props = &errors[0].properties;
    assert_eq!(props["error_type"], "frontend");
    assert_eq!(props["error_name"], "TypeError");
    assert_eq!(props["context"], json!({"component": "ItemList", "apiKey": "[REDACTED]"}));
    assert_eq!(props["replay_url"], "https://app.posthog.com/project/1/replay/browser-1");
}

#[tokio::test]
async fn test_client_report_without_message_is_rejected() {
    let (server, telemetry) = test_server(offline_config());

    let response = server.post("/api/errors").json(&json!({"name": "Nothing"})).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(events_named(&telemetry, ERROR).await.is_empty());
}

#[tokio::test]
async fn test_debug_events_endpoint() {
    let (server, telemetry) = test_server(offline_config());
    for name in ["a", "b", "c"] {
        server.post("/api/items").json(&json!({"name": name})).await;
        assert!(telemetry.flush(FLUSH).await);
    }

    let recent: Vec<Value> = server.get("/api/debug/events").add_query_param("limit", 2).await.json();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["properties"]["request_body"]["name"], "c");
    assert_eq!(recent[1]["properties"]["request_body"]["name"], "b");

    assert_eq!(server.delete("/api/debug/events").await.status_code(), StatusCode::NO_CONTENT);
    let recent: Vec<Value> = server.get("/api/debug/events").await.json();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn test_health() {
    let (server, _telemetry) = test_server(offline_config());
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"status": "ok"}));
}
