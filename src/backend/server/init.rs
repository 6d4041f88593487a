/**
 * Server Initialization
 *
 * Builds the application from a loaded configuration:
 *
 * 1. Create `AppState` (item store + telemetry service)
 * 2. Create the router with all routes and middleware
 *
 * The telemetry handle is returned next to the router so the caller can
 * drain background work on shutdown.
 */

use axum::Router;

use crate::backend::routes::router::create_router;
use crate::backend::server::state::AppState;
use crate::backend::telemetry::{Telemetry, TelemetryError};
use crate::shared::config::AppConfig;

/// Create and configure the Axum application
///
/// Fails only when the HTTP client for the event store cannot be built.
pub fn create_app(config: AppConfig) -> Result<(Router<()>, Telemetry), TelemetryError> {
    tracing::info!(
        port = config.server_port,
        store = %config.telemetry.base_host(),
        ring_capacity = config.telemetry.ring_capacity,
        "Initializing itemtrail backend"
    );

    let app_state = AppState::new(config)?;
    let telemetry = app_state.telemetry.clone();
    let app = create_router(app_state);

    tracing::info!("Router configured");
    Ok((app, telemetry))
}
