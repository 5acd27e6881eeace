//! Owner session lookups.
//!
//! Sessions are issued by the account service; the relay resolves a token
//! to its user and never writes this table.

use crate::errors::BellError;
use crate::models::OwnerSession;
use crate::observability::metrics;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

/// Sessions repository.
pub struct SessionsRepository;

impl SessionsRepository {
    /// Resolve an unexpired session token to its owner.
    #[instrument(skip_all, name = "bell.repo.find_session")]
    pub async fn find_active(
        pool: &PgPool,
        session_token: &str,
    ) -> Result<Option<OwnerSession>, BellError> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT u.id, u.name
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_token = $1
              AND s.expires_at > NOW()
            "#,
        )
        .bind(session_token)
        .fetch_optional(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("find_session", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("find_session", "success", start.elapsed());

        row.map(|row| {
            Ok(OwnerSession {
                user_id: row.try_get("id")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }
}
