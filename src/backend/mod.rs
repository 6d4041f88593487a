//! Backend Module
//!
//! Server-side half of itemtrail: the Axum HTTP server, the item API and the
//! telemetry pipeline that observes it. Only compiled with the `ssr` feature.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`items`** - In-memory item CRUD (the observed API)
//! - **`telemetry`** - Event store client, write tracker, error funnel
//! - **`middleware`** - Identity resolution and request observation
//! - **`auth`** - JWT identity tokens
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── items/          - Item store and handlers
//! ├── telemetry/      - Observability pipeline
//! ├── middleware/     - Request middleware
//! ├── auth/           - Identity tokens
//! └── error/          - Error types
//! ```
//!
//! # Request Flow
//!
//! A write to `/api/items` passes `identity_middleware` (who is calling),
//! then `observe_requests` (capture bodies), then the handler. After the
//! handler returns, the observer spawns the tracker or the error funnel and
//! hands the response back untouched. All store traffic happens off the
//! request path.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// In-memory item API
pub mod items;

/// Observability pipeline
pub mod telemetry;

/// Backend error types
pub mod error;

/// Identity tokens
pub mod auth;

/// Middleware for request processing
pub mod middleware;

pub use error::BackendError;
pub use server::create_app;
pub use telemetry::Telemetry;
