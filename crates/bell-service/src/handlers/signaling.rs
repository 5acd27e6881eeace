//! Signaling handlers.
//!
//! Public endpoints used by the visitor page and the owner app to exchange
//! WebRTC signaling through the relay.

use crate::errors::BellError;
use crate::handlers::visitor_address;
use crate::models::{
    EndCallRequest, MessageResponse, PollQuery, PollResponse, SendSignalRequest,
    SendSignalResponse,
};
use crate::routes::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Path, Query, State,
    },
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;

/// Handle POST /api/signaling/send
///
/// A visitor `ring` passes the access gate first; a blocked visitor gets 403
/// and nothing is stored.
#[instrument(skip_all, name = "bell.api.send")]
pub async fn send_signal(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<SendSignalRequest>, JsonRejection>,
) -> Result<Json<SendSignalResponse>, BellError> {
    let Json(request) = body.map_err(reject_body)?;
    let address = visitor_address(
        &headers,
        connect_info.as_ref(),
        state.config.trust_forwarded_for,
    );

    let message_id = state.relay.send(request, &address).await?;

    Ok(Json(SendSignalResponse { message_id }))
}

/// Handle GET /api/signaling/poll/:room_id
#[instrument(skip_all, name = "bell.api.poll")]
pub async fn poll_signals(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    query: Result<Query<PollQuery>, QueryRejection>,
) -> Result<Json<PollResponse>, BellError> {
    let Query(query) = query.map_err(|e| {
        tracing::debug!(target: "bell.api", error = %e, "Rejected poll query");
        BellError::BadRequest(e.body_text())
    })?;

    let messages = state
        .relay
        .poll(
            &room_id,
            query.sender_type.as_deref(),
            query.last_id.as_deref(),
        )
        .await?;

    Ok(Json(PollResponse { messages }))
}

/// Handle POST /api/signaling/end-call
///
/// Records the call duration. A missing call id or an unknown call is
/// acknowledged without changes.
#[instrument(skip_all, name = "bell.api.end_call")]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    body: Result<Json<EndCallRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, BellError> {
    let Json(request) = body.map_err(reject_body)?;
    let duration = request.duration_seconds.unwrap_or(0);

    if let Some(call_id) = request.call_id.as_deref().filter(|id| !id.is_empty()) {
        let applied = state.lifecycle.record_end(call_id, duration).await?;
        if !applied {
            tracing::debug!(target: "bell.api", call_id = %call_id, "End for unknown call");
        }
    }

    Ok(Json(MessageResponse {
        message: "Call ended".to_string(),
    }))
}

fn reject_body(rejection: JsonRejection) -> BellError {
    tracing::debug!(target: "bell.api", error = %rejection, "Rejected request body");
    BellError::BadRequest(rejection.body_text())
}
