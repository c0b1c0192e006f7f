//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement and CORS header injection.

use std::time::Duration;

use axum::{
    extract::Request,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_EXPOSE_HEADERS,
        },
        HeaderMap, HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ALLOW_HEADERS: &str = "Content-Type,AccessToken,X-CSRF-Token,Authorization,Token,X-Token,X-User-Id";
const ALLOW_METHODS: &str = "POST,GET,OPTIONS,DELETE,PUT";
const EXPOSE_HEADERS: &str =
    "Content-Length,Access-Control-Allow-Origin,Access-Control-Allow-Headers,Content-Type";

/// Set the fixed CORS headers, replacing any value the handler chose.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// CORS middleware for [`axum::middleware::from_fn`].
///
/// `OPTIONS` requests are answered with `200 OK` here and never reach the
/// inner service. Every other response gets the headers on the way out.
pub async fn cors(req: Request, next: Next) -> Response {
    let mut resp = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };
    apply_cors_headers(resp.headers_mut());
    resp
}
