//! Structured request logging shared by the partition and front-end routers
//!
//! Every request gets an `X-Request-ID` (propagated from the caller when
//! present) and a span carrying method and path; completion is logged with
//! status and duration.

use axum::{
    body::Body,
    http::{HeaderValue, Request, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Generate a new unique request ID
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Tag the request with an id, run it inside an `http_request` span and log
/// the outcome. Non-2xx answers are logged at `warn`.
pub async fn request_tracing_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(generate_request_id);

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = async move {
        let start = Instant::now();
        debug!("Request started");
        let response = next.run(request).await;

        let status = response.status().as_u16();
        let duration_ms = start.elapsed().as_millis() as u64;
        if response.status().is_success() {
            info!(status, duration_ms, "Request completed");
        } else {
            let side = if response.status().is_client_error() {
                "client"
            } else {
                "server"
            };
            warn!(status, duration_ms, side, "Request failed");
        }
        response
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
