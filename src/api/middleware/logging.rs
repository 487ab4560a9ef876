use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, info};

/// Logs one line per request. Health endpoints log at debug.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();
    if path == "/health" || path == "/ready" {
        debug!(method = %method, path = %path, status, duration_ms = %duration_ms, "health check completed");
    } else {
        info!(method = %method, path = %path, status, duration_ms = %duration_ms, "request completed");
    }

    response
}
