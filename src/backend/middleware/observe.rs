/**
 * Request Observation Middleware
 *
 * Wraps the item API and feeds the telemetry pipeline without touching what
 * the caller receives:
 *
 * - For `POST`/`PUT`/`PATCH` the request body is buffered and sanitized
 *   before the handler runs.
 * - A response with status >= 400 produces exactly one error event
 *   (`api` for 4xx, `backend` for 5xx) and no write event.
 * - A successful write buffers and sanitizes the response body, builds the
 *   `CallRecord` and hands it to the tracker in the background.
 *
 * The response (status, headers, body) is returned as produced by the
 * handler. A response body that cannot be read is replaced by a 500, which
 * is captured like any other failure.
 */

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::{json, Value};
use std::time::Instant;

use crate::backend::error::{ApplicationFailure, BackendError};
use crate::backend::middleware::auth::CallerIdentity;
use crate::backend::server::state::AppState;
use crate::backend::telemetry::{is_tracked_method, Telemetry};
use crate::shared::event::{CallRecord, ErrorDetails, ErrorSource};

/// Largest request body buffered for tracking; matches axum's default body limit
const MAX_BUFFERED_REQUEST: usize = 2 * 1024 * 1024;

/// Observation middleware for tracked API routes
pub async fn observe_requests(State(app_state): State<AppState>, request: Request, next: Next) -> Response {
    let telemetry = &app_state.telemetry;
    let started = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let url = request.uri().to_string();
    let identity = request.extensions().get::<CallerIdentity>().cloned().unwrap_or_default();
    let request_headers = sanitized_headers(telemetry, request.headers());

    let tracked = is_tracked_method(method.as_str());
    let mut request_body = None;
    let response = if tracked {
        match buffer_request(request).await {
            Ok((request, raw)) => {
                request_body = telemetry.redactor().sanitize_body(parse_body(&raw).as_ref());
                next.run(request).await
            }
            Err(rejection) => rejection,
        }
    } else {
        next.run(request).await
    };
    let status = response.status();

    let failure = FailedRequest {
        method: method.as_str(),
        path: &path,
        url: &url,
        started,
        request_headers: &request_headers,
        request_body: request_body.as_ref(),
    };

    if status.is_client_error() || status.is_server_error() {
        failure.capture(telemetry, &response, identity);
        return response;
    }

    if !tracked {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(%method, %path, error = %e, "Failed to buffer response body");
            let response = BackendError::internal("response body could not be read").into_response();
            failure.capture(telemetry, &response, identity);
            return response;
        }
    };
    let response_body = telemetry.redactor().sanitize_response(parse_body(&bytes).as_ref());

    let record = CallRecord::new(method.as_str(), path)
        .with_url(url)
        .with_request_body(request_body)
        .with_response_body(response_body)
        .with_request_headers(request_headers)
        .with_status(status.as_u16())
        .with_duration_ms(elapsed_ms(started))
        .with_user(identity.user_id)
        .with_session(identity.session_id);
    telemetry.spawn_track_write(record);

    Response::from_parts(parts, Body::from(bytes))
}

/// Request facts kept for the error event of a failed call
struct FailedRequest<'a> {
    method: &'a str,
    path: &'a str,
    url: &'a str,
    started: Instant,
    request_headers: &'a Value,
    request_body: Option<&'a Value>,
}

impl FailedRequest<'_> {
    /// One error event for `response`: `api` for 4xx, `backend` otherwise
    fn capture(&self, telemetry: &Telemetry, response: &Response, identity: CallerIdentity) {
        let status = response.status();
        let source = if status.is_client_error() {
            ErrorSource::Api
        } else {
            ErrorSource::Backend
        };
        let mut details = failure_details(response);
        details.context = Some(json!({
            "method": self.method,
            "path": self.path,
            "url": self.url,
            "status_code": status.as_u16(),
            "duration_ms": elapsed_ms(self.started),
            "request_headers": self.request_headers,
            "request_body": self.request_body,
        }));

        tracing::debug!(method = self.method, path = self.path, status = status.as_u16(), "Capturing failed request");
        telemetry.spawn_capture_error(source, details, identity.user_id, identity.session_id);
    }
}

async fn buffer_request(request: Request) -> Result<(Request, Bytes), Response> {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, MAX_BUFFERED_REQUEST).await {
        Ok(bytes) => Ok((Request::from_parts(parts, Body::from(bytes.clone())), bytes)),
        Err(e) => {
            tracing::warn!(error = %e, "Request body could not be buffered");
            Err(BackendError::handler(StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response())
        }
    }
}

/// Body bytes as JSON; non-JSON text is kept as a string, empty is absent
pub fn parse_body(bytes: &Bytes) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
    }
}

fn sanitized_headers(telemetry: &Telemetry, headers: &HeaderMap) -> Value {
    telemetry.redactor().sanitize_headers(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value))),
    )
}

fn failure_details(response: &Response) -> ErrorDetails {
    match response.extensions().get::<ApplicationFailure>() {
        Some(failure) => ErrorDetails {
            name: Some(failure.name.clone()),
            message: failure.message.clone(),
            stack: failure.stack.clone(),
            context: None,
        },
        None => {
            let status = response.status();
            ErrorDetails::new(
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            )
            .with_name("HttpError")
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
