//! HTTP surface of the exporter: a single Prometheus scrape endpoint.

pub mod metrics;

use crate::metrics::PrometheusMetrics;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<PrometheusMetrics>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics::scrape))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
