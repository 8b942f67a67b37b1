//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! No tokens, subjects or account data are exposed in metrics. Only
//! operational data with bounded cardinality labels.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus-formatted metrics for scraping:
/// ```text
/// # TYPE authorizer_decisions_total counter
/// authorizer_decisions_total{outcome="deny",reason="issuer_mismatch"} 3
/// ```
#[tracing::instrument(skip_all, name = "authorizer.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
