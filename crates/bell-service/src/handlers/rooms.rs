//! Room info handler.

use crate::errors::BellError;
use crate::handlers::visitor_address;
use crate::models::RoomInfoResponse;
use crate::routes::AppState;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    Json,
};
use common::types::RoomId;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;

/// Handle GET /api/call/info/:room_id
///
/// Returns the doorbell's public info. Outside the availability window the
/// response is still 200, with `available: false` and a message naming the
/// window.
#[instrument(skip_all, name = "bell.api.room_info")]
pub async fn room_info(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<RoomInfoResponse>, BellError> {
    let room = RoomId::parse(&room_id)
        .map_err(|e| BellError::BadRequest(format!("Invalid room id: {e}")))?;
    let address = visitor_address(
        &headers,
        connect_info.as_ref(),
        state.config.trust_forwarded_for,
    );

    let info = state.gate.room_info(&room, &address).await?;

    Ok(Json(info))
}
