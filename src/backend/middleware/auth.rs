/**
 * Identity Middleware
 *
 * Resolves who is calling and attaches it to the request as a
 * `CallerIdentity` extension:
 *
 * - user id: the `sub` of a valid `Authorization: Bearer <jwt>`, otherwise
 *   `"anonymous"`
 * - session id: the `X-Session-ID` header, if present and non-blank
 *
 * This middleware never rejects a request. An invalid token is logged and
 * the caller is treated as anonymous.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

use crate::backend::auth::sessions::verify_token;
use crate::backend::middleware::session::session_id_from_headers;
use crate::backend::server::state::AppState;
use crate::shared::event::ANONYMOUS_USER;

/// Who issued the current request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub session_id: Option<String>,
}

impl Default for CallerIdentity {
    fn default() -> Self {
        Self {
            user_id: ANONYMOUS_USER.to_string(),
            session_id: None,
        }
    }
}

impl CallerIdentity {
    /// Resolve the identity carried by `headers`
    pub fn from_headers(headers: &HeaderMap, jwt_secret: &str) -> Self {
        Self {
            user_id: user_from_headers(headers, jwt_secret).unwrap_or_else(|| ANONYMOUS_USER.to_string()),
            session_id: session_id_from_headers(headers),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER
    }
}

fn user_from_headers(headers: &HeaderMap, jwt_secret: &str) -> Option<String> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?
        .strip_prefix("Bearer ")?
        .trim();

    match verify_token(token, jwt_secret) {
        Ok(claims) if !claims.sub.trim().is_empty() => Some(claims.sub),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid bearer token");
            None
        }
    }
}

/// Identity middleware
pub async fn identity_middleware(State(app_state): State<AppState>, mut request: Request, next: Next) -> Response {
    let identity = CallerIdentity::from_headers(request.headers(), &app_state.config.jwt_secret);
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Extractor for the caller identity.
///
/// Falls back to resolving from headers alone (anonymous user) when the
/// identity middleware did not run.
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .unwrap_or_else(|| CallerIdentity {
                session_id: session_id_from_headers(&parts.headers),
                ..CallerIdentity::default()
            }))
    }
}
