//! Prometheus metrics endpoint handler.
//!
//! The endpoint is unauthenticated so Prometheus can scrape it. Labels carry
//! no room ids, addresses or visitor names.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// # Response
///
/// 200 OK with Prometheus text format:
/// ```text
/// # TYPE bell_http_requests_total counter
/// bell_http_requests_total{method="POST",endpoint="/api/signaling/send",status_code="200"} 42
/// ```
#[tracing::instrument(skip_all, name = "bell.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
