//! Backend Error Module
//!
//! This module defines error types specific to the backend server.
//! These errors are used in HTTP handlers and can be converted to HTTP responses.
//!
//! # Architecture
//!
//! - **`types`** - Error type definitions and constructors
//! - **`conversion`** - `IntoResponse` and the `ApplicationFailure` extension
//!
//! # HTTP Response Conversion
//!
//! Handlers return `Result<_, BackendError>`. The error becomes a JSON body
//! `{"error": ..., "status": ...}` with the matching status code, and the
//! failure details ride along as a response extension for error capture.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use conversion::ApplicationFailure;
pub use types::BackendError;
