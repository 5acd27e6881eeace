//! Call history handlers.
//!
//! All routes here sit behind the session middleware, which injects the
//! [`OwnerSession`]. Every read and delete is scoped to that owner.

use crate::errors::BellError;
use crate::models::{CallRecord, CallStats, MessageResponse, OwnerSession};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handle GET /api/calls/history
///
/// Newest first, capped at the configured history limit.
#[instrument(skip_all, name = "bell.api.calls.list")]
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<OwnerSession>,
) -> Result<Json<Vec<CallRecord>>, BellError> {
    let calls = state.history.list(&session.user_id).await?;
    Ok(Json(calls))
}

/// Handle GET /api/calls/stats
#[instrument(skip_all, name = "bell.api.calls.stats")]
pub async fn call_stats(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<OwnerSession>,
) -> Result<Json<CallStats>, BellError> {
    let stats = state.history.stats(&session.user_id).await?;
    Ok(Json(stats))
}

/// Handle DELETE /api/calls/:call_id
///
/// 404 when the call does not exist or belongs to another owner.
#[instrument(skip_all, name = "bell.api.calls.delete", fields(call_id = %call_id))]
pub async fn delete_call(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<OwnerSession>,
    Path(call_id): Path<String>,
) -> Result<Json<MessageResponse>, BellError> {
    state.history.delete(&call_id, &session.user_id).await?;

    Ok(Json(MessageResponse {
        message: "Call deleted".to_string(),
    }))
}
