//! Signaling message repository.
//!
//! Append-only log of relay messages per room. Poll claims are a single
//! conditional `UPDATE` over a `FOR UPDATE SKIP LOCKED` selection, so two
//! concurrent polls for the same room and role never return the same row.

use crate::errors::BellError;
use crate::models::{MessageType, NewSignalingMessage, SenderRole, SignalingMessage};
use crate::observability::metrics;
use serde_json::{Map, Value};
use sqlx::postgres::PgExecutor;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// Signaling messages repository.
pub struct SignalingMessagesRepository;

impl SignalingMessagesRepository {
    /// Append a message with `delivered = false`.
    ///
    /// `created_at` and `seq` are assigned by the database.
    #[instrument(skip_all, name = "bell.repo.append_message", fields(room_id = %message.room_id))]
    pub async fn append<'e, E>(
        executor: E,
        message: &NewSignalingMessage,
    ) -> Result<SignalingMessage, BellError>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO signaling_messages (id, room_id, sender_role, message_type, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING seq, id, room_id, sender_role, message_type, payload, created_at, delivered
            "#,
        )
        .bind(message.id)
        .bind(&message.room_id)
        .bind(message.sender_role.as_str())
        .bind(message.message_type.as_str())
        .bind(Json(&message.payload))
        .fetch_one(executor)
        .await
        .map_err(|e| {
            metrics::record_db_query("append_message", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("append_message", "success", start.elapsed());

        map_row_to_message(&row)
    }

    /// Claim up to `limit` undelivered messages sent by `sender` into `room_id`.
    ///
    /// Claimed rows are flipped to delivered in the same statement and
    /// returned ordered by `(created_at, seq)`.
    #[instrument(skip_all, name = "bell.repo.claim_messages", fields(room_id = %room_id, sender = sender.as_str()))]
    pub async fn claim_undelivered(
        pool: &PgPool,
        room_id: &str,
        sender: SenderRole,
        limit: i64,
    ) -> Result<Vec<SignalingMessage>, BellError> {
        let start = Instant::now();

        let rows = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT seq
                FROM signaling_messages
                WHERE room_id = $1
                  AND sender_role = $2
                  AND delivered = FALSE
                ORDER BY created_at ASC, seq ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE signaling_messages m
            SET delivered = TRUE
            FROM claimable
            WHERE m.seq = claimable.seq
              AND m.delivered = FALSE
            RETURNING m.seq, m.id, m.room_id, m.sender_role, m.message_type,
                      m.payload, m.created_at, m.delivered
            "#,
        )
        .bind(room_id)
        .bind(sender.as_str())
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("claim_messages", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("claim_messages", "success", start.elapsed());

        // UPDATE ... RETURNING has no ordering guarantee.
        let mut messages = rows
            .iter()
            .map(map_row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));

        Ok(messages)
    }
}

fn map_row_to_message(row: &sqlx::postgres::PgRow) -> Result<SignalingMessage, BellError> {
    let sender_raw: String = row.try_get("sender_role")?;
    let sender_role = SenderRole::parse(&sender_raw)
        .ok_or_else(|| BellError::Database(format!("unknown sender_role '{}'", sender_raw)))?;

    let type_raw: String = row.try_get("message_type")?;
    let message_type = MessageType::parse(&type_raw)
        .ok_or_else(|| BellError::Database(format!("unknown message_type '{}'", type_raw)))?;

    let Json(payload): Json<Map<String, Value>> = row.try_get("payload")?;

    Ok(SignalingMessage {
        seq: row.try_get("seq")?,
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        sender_role,
        message_type,
        payload,
        created_at: row.try_get("created_at")?,
        delivered: row.try_get("delivered")?,
    })
}
