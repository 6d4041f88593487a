//! Shared Module
//!
//! This module contains the platform-agnostic half of the observability
//! pipeline: the record types, the structural differ, the redactor, the local
//! event ring buffer and configuration. Nothing in here touches the network
//! or the async runtime, so it compiles without the `ssr` feature.
//!
//! # Overview
//!
//! - **`event`** - `CallRecord`, `EnrichedWriteEvent`, `ErrorEvent`
//! - **`diff`** - recursive added/removed/changed comparison of JSON values
//! - **`redact`** - sensitive field/header redaction and size truncation
//! - **`ring`** - bounded in-memory log of recently produced events
//! - **`config`** - `AppConfig` / `TelemetryConfig`

/// Telemetry record types
pub mod event;

/// Structural differ
pub mod diff;

/// Payload sanitization
pub mod redact;

/// Local event ring buffer
pub mod ring;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError, TelemetryConfig};
pub use diff::{diff, DiffNode};
pub use error::SharedError;
pub use event::{CallRecord, EnrichedWriteEvent, ErrorDetails, ErrorEvent, ErrorSource};
pub use redact::Redactor;
pub use ring::{EventRing, RingBufferEntry};
