//! Request logging middleware.
//!
//! One line per request with method, path, status and latency. Query strings
//! are left out since `/login` carries the tenant there.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, info, warn};

pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Health probes are noisy
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), latency_ms, "Request failed (5xx)");
    } else if status.is_client_error() {
        info!(method = %method, path = %path, status = status.as_u16(), latency_ms, "Request rejected (4xx)");
    } else {
        debug!(method = %method, path = %path, status = status.as_u16(), latency_ms, "Request completed");
    }

    response
}
