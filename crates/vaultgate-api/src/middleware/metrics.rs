//! # Request Metrics
//!
//! In-process atomic counters (readable in tests without a recorder) plus
//! `vaultgate_http_requests_total{status}` through the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Shared request counters.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests served.
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Requests answered with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }
}

/// Count every request and its status class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let counters = request.extensions().get::<ApiMetrics>().cloned();

    let response = next.run(request).await;
    let status = response.status();

    if let Some(m) = counters {
        m.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_server_error() || status.is_client_error() {
            m.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
    metrics::counter!("vaultgate_http_requests_total", "status" => status.as_u16().to_string())
        .increment(1);

    response
}
