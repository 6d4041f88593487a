use axum::http::HeaderMap;

/// Header carrying the client-side session recording id
pub const SESSION_HEADER: &str = "x-session-id";

/// Client session id from `headers`; blank or absent is `None`
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
