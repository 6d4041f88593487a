//! itemtrail - Write-Request Observability
//!
//! A small item API whose mutating calls are tracked with change history and
//! whose failures are funneled into one error stream.
//!
//! # Overview
//!
//! - Every successful `POST`/`PUT`/`PATCH` produces one enriched write event:
//!   the current call, the most recent earlier call to the same endpoint
//!   (looked up in a remote, eventually-consistent event store) and a
//!   structural diff of the request and response bodies.
//! - Every failure (handler errors and client-side reports) produces one
//!   error event, linked to the client's session recording when the request
//!   carries an `X-Session-ID`.
//! - Payloads are redacted and size-capped before they leave the process.
//! - The last N events are kept in a local ring buffer for debugging.
//!
//! # Module Structure
//!
//! - **`shared`** - Platform-agnostic types: records, differ, redactor, ring
//!   buffer, configuration, error types
//! - **`backend`** - Server-side code (only compiled with `ssr` feature):
//!   Axum server, middleware, event store client, tracker, error funnel
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables the `backend` module and the server binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use itemtrail::backend::server::create_app;
//! use itemtrail::shared::AppConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (app, telemetry) = create_app(AppConfig::default())?;
//! // Serve `app` with axum, then `telemetry.shutdown().await`
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - `shared::error::SharedError` for record and validation failures
//! - `backend::error::BackendError` for HTTP handlers
//! - `backend::telemetry::TelemetryError` for the event store; these are
//!   logged and never surface to API callers

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
