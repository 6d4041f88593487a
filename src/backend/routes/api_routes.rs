/**
 * API Route Configuration
 *
 * The item API, observed by `observe_requests`:
 *
 * - `GET /api/items`, `POST /api/items`
 * - `GET /api/items/{id}`, `PUT /api/items/{id}`, `PATCH /api/items/{id}`,
 *   `DELETE /api/items/{id}`
 *
 * Observation is a route layer, so it only runs for requests that matched
 * one of these routes. Handler panics are turned into a 500 inside the
 * observed layer and captured as `backend` failures.
 */

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

use crate::backend::error::BackendError;
use crate::backend::items::handlers::{create_item, delete_item, get_item, list_items, patch_item, replace_item};
use crate::backend::middleware::observe_requests;
use crate::backend::server::state::AppState;

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>, app_state: &AppState) -> Router<AppState> {
    let items = Router::new()
        .route("/api/items", get(list_items).post(create_item))
        .route(
            "/api/items/{id}",
            get(get_item).put(replace_item).patch(patch_item).delete(delete_item),
        );

    router.merge(observed(items, app_state))
}

/// Wrap `routes` in panic recovery and request observation
pub fn observed(routes: Router<AppState>, app_state: &AppState) -> Router<AppState> {
    routes
        .route_layer(CatchPanicLayer::custom(panic_response))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), observe_requests))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(panic = %detail, "Request handler panicked");
    BackendError::internal("request handler panicked").into_response()
}
