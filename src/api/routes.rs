//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{codebase_gpa, coverage_history, hello, prometheus_metrics, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/", get(hello))
        .route("/health", get(hello))
        // Metric endpoints, with and without trailing slash
        .route("/codescore/gpa", get(codebase_gpa))
        .route("/codescore/gpa/", get(codebase_gpa))
        .route("/codescore/coverage-history", get(coverage_history))
        .route("/codescore/coverage-history/", get(coverage_history))
        // Prometheus exposition
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
