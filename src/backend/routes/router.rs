/**
 * Router Configuration
 *
 * Combines all route configurations into a single Axum router.
 *
 * # Layers (outermost first)
 *
 * 1. `TraceLayer` - request spans
 * 2. `identity_middleware` - attaches `CallerIdentity`
 * 3. `observe_requests` - item routes only (see `api_routes`)
 */

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::backend::error::BackendError;
use crate::backend::middleware::identity_middleware;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::routes::telemetry_routes::configure_telemetry_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new();
    let router = configure_api_routes(router, &app_state);
    let router = configure_telemetry_routes(router);

    router
        .fallback(|| async { BackendError::handler(axum::http::StatusCode::NOT_FOUND, "route not found") })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(app_state.clone(), identity_middleware)),
        )
        .with_state(app_state)
}
