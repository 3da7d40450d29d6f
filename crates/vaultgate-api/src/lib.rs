//! # vaultgate-api: HTTP Boundary
//!
//! | Route                         | Module                    |
//! |-------------------------------|---------------------------|
//! | `POST /v1/decrypt`            | [`routes::decrypt`]       |
//! | `POST /v1/decrypt/batch`      | [`routes::decrypt`]       |
//! | `POST /v1/grants/introspect`  | [`routes::grants`]        |
//! | `GET /openapi.json`           | [`openapi`]               |
//! | `GET /metrics`                | Prometheus exposition     |
//! | `GET /health/*`               | liveness / readiness      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → Handler
//! ```
//!
//! Callers authenticate with the session access token in the request
//! body; there is no ambient auth layer.

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    app_with_metrics(state, ApiMetrics::new())
}

/// Assemble the router with caller-owned request counters.
pub fn app_with_metrics(state: AppState, metrics: ApiMetrics) -> Router {
    let api = Router::new()
        .merge(routes::decrypt::router())
        .merge(routes::grants::router())
        .merge(openapi::router())
        .route("/metrics", get(prometheus))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(metrics))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe. 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe.
async fn readiness() -> &'static str {
    "ready"
}

/// Prometheus text exposition; 404 when no recorder is installed.
async fn prometheus(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
