//! Push subscription lookups for doorbell notifications.

use crate::errors::BellError;
use crate::observability::metrics;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// Upper bound on device tokens addressed by one notification.
pub const MAX_TOKENS_PER_NOTIFICATION: i64 = 100;

/// Push subscriptions repository.
pub struct PushSubscriptionsRepository;

impl PushSubscriptionsRepository {
    /// Device tokens registered by `owner_id`.
    #[instrument(skip_all, name = "bell.repo.push_tokens")]
    pub async fn tokens_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<String>, BellError> {
        let start = Instant::now();

        let tokens: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT token
            FROM push_subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(MAX_TOKENS_PER_NOTIFICATION)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("push_tokens", "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

        metrics::record_db_query("push_tokens", "success", start.elapsed());

        Ok(tokens)
    }
}
