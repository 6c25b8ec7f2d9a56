//! Request logging middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, info};

/// Logs one line per request. Probe and scrape traffic goes to `debug`.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if is_probe(&path) {
        debug!(target: "http", %method, %path, status, duration_ms, "Probe served");
    } else {
        info!(target: "http", %method, %path, status, duration_ms, "HTTP request completed");
    }

    response
}

fn is_probe(path: &str) -> bool {
    path.starts_with("/health") || path == "/metrics"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_paths() {
        assert!(is_probe("/health"));
        assert!(is_probe("/health/queue"));
        assert!(is_probe("/metrics"));
        assert!(!is_probe("/internal/actions/process"));
    }
}
