//! Middleware Module
//!
//! HTTP middleware for the backend server.
//!
//! - **`auth`** - caller identity resolution (`identity_middleware`, `CallerIdentity`)
//! - **`session`** - client session id header
//! - **`observe`** - write tracking and error capture (`observe_requests`)
//!
//! Identity runs on every route; observation only on the item API, inside
//! the identity layer so it can read the resolved caller.

pub mod auth;
pub mod observe;
pub mod session;

pub use auth::{identity_middleware, CallerIdentity};
pub use observe::observe_requests;
pub use session::{session_id_from_headers, SESSION_HEADER};
