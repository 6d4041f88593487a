//! Authentication Module
//!
//! Caller identity for tracked events. Identity is resolved from a bearer JWT
//! when one is present and valid; everybody else is `"anonymous"`. Nothing in
//! this module rejects a request.
//!
//! - **`sessions`** - JWT token generation and validation

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{create_token, verify_token, Claims};
