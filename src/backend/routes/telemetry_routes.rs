/**
 * Telemetry Route Handlers
 *
 * - `POST /api/errors` - client-side error report, captured as `frontend`
 * - `GET /api/debug/events?limit=N` - recent events from the local buffer
 * - `DELETE /api/debug/events` - clear the local buffer
 * - `GET /health` - liveness probe
 */

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::backend::error::BackendError;
use crate::backend::middleware::auth::CallerIdentity;
use crate::backend::server::state::AppState;
use crate::backend::telemetry::Telemetry;
use crate::shared::event::{ErrorDetails, ErrorSource};
use crate::shared::ring::RingBufferEntry;

/// Entries returned when no limit is given
pub const DEFAULT_DEBUG_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    pub limit: Option<usize>,
}

/// Configure telemetry routes
pub fn configure_telemetry_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/errors", post(report_error))
        .route("/api/debug/events", get(recent_events).delete(clear_events))
        .route("/health", get(health))
}

/// Accept a client-side error report
pub async fn report_error(
    State(telemetry): State<Telemetry>,
    identity: CallerIdentity,
    Json(details): Json<ErrorDetails>,
) -> Result<(StatusCode, Json<Value>), BackendError> {
    details.validate()?;
    telemetry.spawn_capture_error(ErrorSource::Frontend, details, identity.user_id, identity.session_id);
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "captured" }))))
}

pub async fn recent_events(
    State(telemetry): State<Telemetry>,
    Query(query): Query<DebugQuery>,
) -> Json<Vec<RingBufferEntry>> {
    Json(telemetry.ring().recent(query.limit.unwrap_or(DEFAULT_DEBUG_LIMIT)))
}

pub async fn clear_events(State(telemetry): State<Telemetry>) -> StatusCode {
    let cleared = telemetry.ring().len();
    telemetry.ring().clear();
    tracing::info!(cleared, "Local event buffer cleared");
    StatusCode::NO_CONTENT
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
