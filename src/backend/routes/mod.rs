//! Route Configuration Module
//!
//! This module configures all HTTP routes for the backend server.
//!
//! - **`router`** - Main router creation and layer stack
//! - **`api_routes`** - The observed item API
//! - **`telemetry_routes`** - Error reports, debug buffer, health
//!
//! # Routes
//!
//! - `GET|POST /api/items`
//! - `GET|PUT|PATCH|DELETE /api/items/{id}`
//! - `POST /api/errors`
//! - `GET|DELETE /api/debug/events`
//! - `GET /health`

/// Main router creation
pub mod router;

/// Item API routes
pub mod api_routes;

/// Error reporting and debug routes
pub mod telemetry_routes;

pub use router::create_router;
