//! Health check handlers.
//!
//! `/health` is a liveness probe that never touches the database. `/ready`
//! pings the database and returns 503 while it is unreachable.

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::instrument;

/// Liveness probe.
#[instrument(skip_all, name = "bell.health.live")]
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "ready",
///   "database": "healthy"
/// }
/// ```
#[instrument(skip_all, name = "bell.health.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    match sqlx::query("SELECT 1").fetch_one(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: Some("healthy"),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "bell.health", error = %e, "Readiness check failed");
            // Generic message, the driver error may contain connection details
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    database: Some("unhealthy"),
                    error: Some("Database unavailable".to_string()),
                }),
            )
        }
    }
}
