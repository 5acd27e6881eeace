//! Call records repository.
//!
//! One row per accepted ring. Status and duration are the only mutable
//! columns; history reads and deletes are always scoped to the owner.

use crate::errors::BellError;
use crate::models::{CallRecord, CallStats, CallStatus, NewCallRecord};
use crate::observability::metrics;
use sqlx::postgres::PgExecutor;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Call records repository.
pub struct CallRecordsRepository;

impl CallRecordsRepository {
    /// Insert a call record with status `missed`.
    ///
    /// Runs on the pool or inside a transaction.
    #[instrument(skip_all, name = "bell.repo.create_call", fields(call_id = %record.id))]
    pub async fn create<'e, E>(executor: E, record: &NewCallRecord) -> Result<CallRecord, BellError>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            INSERT INTO call_records (id, owner_id, visitor_name, visitor_address, status)
            VALUES ($1, $2, $3, $4, 'missed')
            RETURNING id, owner_id, visitor_name, visitor_address, status,
                      duration_seconds, created_at
            "#,
        )
        .bind(record.id)
        .bind(&record.owner_id)
        .bind(&record.visitor_name)
        .bind(&record.visitor_address)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            metrics::record_db_query("create_call", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("create_call", "success", start.elapsed());

        map_row_to_call(&row)
    }

    /// Set the status of a call. Returns false when the call does not exist.
    #[instrument(skip_all, name = "bell.repo.set_call_status", fields(call_id = %call_id, status = status.as_str()))]
    pub async fn set_status(
        pool: &PgPool,
        call_id: Uuid,
        status: CallStatus,
    ) -> Result<bool, BellError> {
        let start = Instant::now();

        let result = sqlx::query("UPDATE call_records SET status = $2 WHERE id = $1")
            .bind(call_id)
            .bind(status.as_str())
            .execute(pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("set_call_status", "error", start.elapsed());
                BellError::Database(e.to_string())
            })?;

        metrics::record_db_query("set_call_status", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }

    /// Set the duration of a call (last write wins). Returns false when the
    /// call does not exist.
    #[instrument(skip_all, name = "bell.repo.set_call_duration", fields(call_id = %call_id))]
    pub async fn set_duration(
        pool: &PgPool,
        call_id: Uuid,
        duration_seconds: i32,
    ) -> Result<bool, BellError> {
        let start = Instant::now();

        let result = sqlx::query("UPDATE call_records SET duration_seconds = $2 WHERE id = $1")
            .bind(call_id)
            .bind(duration_seconds)
            .execute(pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("set_call_duration", "error", start.elapsed());
                BellError::Database(e.to_string())
            })?;

        metrics::record_db_query("set_call_duration", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }

    /// Newest-first call history for an owner.
    #[instrument(skip_all, name = "bell.repo.list_calls")]
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<CallRecord>, BellError> {
        let start = Instant::now();

        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, visitor_name, visitor_address, status,
                   duration_seconds, created_at
            FROM call_records
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("list_calls", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("list_calls", "success", start.elapsed());

        rows.iter().map(map_row_to_call).collect()
    }

    /// Per-status counts for an owner.
    #[instrument(skip_all, name = "bell.repo.call_stats")]
    pub async fn stats_for_owner(pool: &PgPool, owner_id: &str) -> Result<CallStats, BellError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'answered') AS answered,
                COUNT(*) FILTER (WHERE status = 'missed') AS missed,
                COUNT(*) FILTER (WHERE status = 'blocked') AS blocked
            FROM call_records
            WHERE owner_id = $1
            "#,
        )
        .bind(owner_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("call_stats", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("call_stats", "success", start.elapsed());

        Ok(CallStats {
            total: row.try_get("total")?,
            answered: row.try_get("answered")?,
            missed: row.try_get("missed")?,
            blocked: row.try_get("blocked")?,
        })
    }

    /// Delete a call owned by `owner_id`. Returns false when nothing matched.
    #[instrument(skip_all, name = "bell.repo.delete_call", fields(call_id = %call_id))]
    pub async fn delete_for_owner(
        pool: &PgPool,
        call_id: Uuid,
        owner_id: &str,
    ) -> Result<bool, BellError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM call_records WHERE id = $1 AND owner_id = $2")
            .bind(call_id)
            .bind(owner_id)
            .execute(pool)
            .await
            .map_err(|e| {
                metrics::record_db_query("delete_call", "error", start.elapsed());
                BellError::Database(e.to_string())
            })?;

        metrics::record_db_query("delete_call", "success", start.elapsed());

        Ok(result.rows_affected() > 0)
    }
}

fn map_row_to_call(row: &sqlx::postgres::PgRow) -> Result<CallRecord, BellError> {
    let status_raw: String = row.try_get("status")?;
    let status = CallStatus::parse(&status_raw)
        .ok_or_else(|| BellError::Database(format!("unknown call status '{}'", status_raw)))?;

    Ok(CallRecord {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        visitor_name: row.try_get("visitor_name")?,
        visitor_address: row.try_get("visitor_address")?,
        status,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}
