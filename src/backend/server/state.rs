/**
 * Application State Management
 *
 * `AppState` is the central state container shared by every handler and
 * middleware:
 *
 * - `items` - the in-memory item store behind `Arc<RwLock<>>`
 * - `telemetry` - the observability service (store client, ring buffer,
 *   tracker, funnel, background tasks)
 * - `config` - the loaded application configuration
 *
 * The `FromRef` implementations let handlers extract only the part they
 * need, e.g. `State(items): State<SharedItems>`.
 */

use axum::extract::FromRef;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::items::{ItemStore, SharedItems};
use crate::backend::telemetry::{Telemetry, TelemetryError};
use crate::shared::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub items: SharedItems,
    pub telemetry: Telemetry,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, TelemetryError> {
        let telemetry = Telemetry::new(config.telemetry.clone())?;
        Ok(Self {
            items: Arc::new(RwLock::new(ItemStore::new())),
            telemetry,
            config: Arc::new(config),
        })
    }
}

impl FromRef<AppState> for SharedItems {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.items.clone()
    }
}

impl FromRef<AppState> for Telemetry {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.telemetry.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
