//! Telemetry Module
//!
//! Observability side channel for the API: write tracking with change
//! history, centralized error capture and the local debug buffer.
//!
//! # Architecture
//!
//! - **`store`** - HTTP client for the remote event store (ingestion + history)
//! - **`tracker`** - Write-request tracker (previous call lookup, diff, emit)
//! - **`funnel`** - Error funnel (normalize, link replay, emit)
//! - **`tasks`** - Supervision of fire-and-forget background work
//! - **`error`** - `TelemetryError` reason codes
//!
//! # Module Structure
//!
//! ```text
//! telemetry/
//! ├── mod.rs      - Telemetry service object
//! ├── store.rs    - Event store client
//! ├── tracker.rs  - Write tracker
//! ├── funnel.rs   - Error funnel
//! ├── tasks.rs    - Background task supervision
//! └── error.rs    - Error types
//! ```
//!
//! # Lifecycle
//!
//! One `Telemetry` is built at startup and shared through `AppState`. Request
//! handling only ever *spawns* work on it; `shutdown` drains that work within
//! `shutdown_drain_ms` before the process exits.

pub mod error;
pub mod funnel;
pub mod store;
pub mod tasks;
pub mod tracker;

pub use error::TelemetryError;
pub use funnel::ErrorFunnel;
pub use store::{EventStoreClient, QueryTier};
pub use tasks::BackgroundTasks;
pub use tracker::{is_tracked_method, WriteTracker};

use std::sync::Arc;
use std::time::Duration;

use crate::shared::config::TelemetryConfig;
use crate::shared::event::{CallRecord, ErrorDetails, ErrorSource};
use crate::shared::redact::Redactor;
use crate::shared::ring::EventRing;

/// Shared telemetry service
///
/// Cheap to clone; every clone drives the same tracker, funnel, ring buffer
/// and task set.
#[derive(Clone)]
pub struct Telemetry {
    config: Arc<TelemetryConfig>,
    ring: Arc<EventRing>,
    redactor: Arc<Redactor>,
    tracker: Arc<WriteTracker>,
    funnel: Arc<ErrorFunnel>,
    tasks: BackgroundTasks,
}

impl Telemetry {
    pub fn new(config: TelemetryConfig) -> Result<Self, TelemetryError> {
        let store = Arc::new(EventStoreClient::new(&config)?);
        let ring = Arc::new(EventRing::new(config.ring_capacity));
        let redactor = Arc::new(Redactor::from_config(&config));
        let tracker = Arc::new(WriteTracker::new(
            Arc::clone(&store),
            Arc::clone(&ring),
            config.history_per_user,
        ));
        let funnel = Arc::new(ErrorFunnel::new(
            Arc::clone(&store),
            Arc::clone(&ring),
            Arc::clone(&redactor),
            config.max_stack_chars,
        ));

        if store.emission_enabled() {
            tracing::info!(host = store.host(), project = ?store.namespace(), "Telemetry emission enabled");
        } else {
            tracing::info!("No event store ingestion key configured, events stay in the local buffer only");
        }

        Ok(Self {
            config: Arc::new(config),
            ring,
            redactor,
            tracker,
            funnel,
            tasks: BackgroundTasks::new(),
        })
    }

    /// Local buffer of recently emitted events
    pub fn ring(&self) -> &EventRing {
        &self.ring
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Track `record` in the background. Returns immediately.
    pub fn spawn_track_write(&self, record: CallRecord) {
        let tracker = Arc::clone(&self.tracker);
        self.tasks.spawn("track_write", async move {
            tracker.track_write(record).await;
        });
    }

    /// Capture one failure in the background. Returns immediately.
    pub fn spawn_capture_error(
        &self,
        source: ErrorSource,
        details: ErrorDetails,
        user_id: String,
        session_id: Option<String>,
    ) {
        let funnel = Arc::clone(&self.funnel);
        self.tasks.spawn("capture_error", async move {
            funnel
                .capture_error(source, details, &user_id, session_id.as_deref())
                .await;
        });
    }

    /// Number of background tasks not yet reaped
    pub fn pending_tasks(&self) -> usize {
        self.tasks.pending()
    }

    /// Wait up to `timeout` for outstanding background work
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.tasks.flush(timeout).await
    }

    /// Drain background work within the configured bound, then abort the rest
    pub async fn shutdown(&self) {
        let bound = Duration::from_millis(self.config.shutdown_drain_ms);
        tracing::info!(pending = self.tasks.pending(), "Draining telemetry tasks");
        if self.tasks.shutdown(bound).await {
            tracing::info!("Telemetry drained");
        } else {
            tracing::warn!(bound_ms = self.config.shutdown_drain_ms, "Telemetry drain bound reached, remaining events dropped");
        }
    }
}
