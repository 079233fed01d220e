//! Request middleware: tracing, CORS and body presence checks.

use std::time::Instant;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;
use tracing::{Instrument, info, info_span};

use super::MAX_BODY_BYTES;
use super::error::ApiError;

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: HeaderName = HeaderName::from_static("x-trace-id");

const TRACE_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `trace_{unix_millis}_{7 random base-36 chars}`.
pub fn generate_trace_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..7)
        .map(|_| char::from(TRACE_SUFFIX_ALPHABET[rng.gen_range(0..TRACE_SUFFIX_ALPHABET.len())]))
        .collect();
    format!("trace_{millis}_{suffix}")
}

/// Wrap the request in a span with a fresh trace id, log start and end,
/// and echo the id back in [`TRACE_ID_HEADER`].
pub(crate) async fn trace_requests(req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let started = Instant::now();

    let mut response = async {
        info!("request started");
        next.run(req).await
    }
    .instrument(span.clone())
    .await;

    let status = response.status().as_u16();
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    span.in_scope(|| info!(status, duration_ms, "request finished"));

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// CORS headers on every response; preflight `OPTIONS` ends here with 200.
pub(crate) async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(req).await
    };
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

/// Reject `POST` requests whose body is empty or an empty JSON object.
pub(crate) async fn require_body(req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            return ApiError::invalid(format!("failed to read request body: {e}")).into_response();
        }
    };
    if is_empty_body(&bytes) {
        return ApiError::invalid("Request body is required").into_response();
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn is_empty_body(bytes: &[u8]) -> bool {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return true;
    }
    matches!(
        serde_json::from_slice::<serde_json::Value>(bytes),
        Ok(serde_json::Value::Object(map)) if map.is_empty()
    )
}

/// Fallback for a known path hit with an unsupported method.
pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Fallback for unknown paths.
pub(crate) async fn not_found() -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        crate::api::ApiErrorCode::InvalidRequest,
        "Not found",
    )
}
