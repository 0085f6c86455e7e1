//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use axum::http::header::{HeaderName, CACHE_CONTROL, EXPIRES, PRAGMA};
use axum::http::HeaderValue;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Headers that keep browsers, proxies and CDNs from caching a response.
pub fn no_cache_headers() -> [(HeaderName, HeaderValue); 5] {
    [
        (
            CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ),
        (PRAGMA, HeaderValue::from_static("no-cache")),
        (EXPIRES, HeaderValue::from_static("0")),
        (
            HeaderName::from_static("cdn-cache-control"),
            HeaderValue::from_static("no-store"),
        ),
        (
            HeaderName::from_static("surrogate-control"),
            HeaderValue::from_static("no-store"),
        ),
    ]
}
