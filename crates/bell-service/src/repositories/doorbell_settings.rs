//! Doorbell settings repository.
//!
//! Settings rows are owned by the account service; the relay only reads them.
//! An owner without a settings row has no doorbell.

use crate::errors::BellError;
use crate::models::{
    AccessPolicy, AvailabilityWindow, DoorbellProfile, DEFAULT_DISPLAY_NAME,
};
use crate::observability::metrics;
use chrono::NaiveTime;
use sqlx::postgres::PgExecutor;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Instant;
use tracing::instrument;

macro_rules! profile_select {
    () => {
        r#"
        SELECT
            u.name AS owner_name,
            s.display_name,
            s.availability_enabled,
            s.availability_start,
            s.availability_end,
            s.blocked_ips
        FROM doorbell_settings s
        LEFT JOIN users u ON u.id = s.user_id
        WHERE s.user_id = $1
        "#
    };
}

const FIND_PROFILE_SQL: &str = profile_select!();

// Only the settings row is locked; users is the nullable side of the join.
const LOCK_PROFILE_SQL: &str = concat!(profile_select!(), "FOR SHARE OF s");

/// Doorbell settings repository.
pub struct DoorbellSettingsRepository;

impl DoorbellSettingsRepository {
    /// Load the doorbell profile of `owner_id`.
    ///
    /// Returns `None` when the owner has no settings row.
    #[instrument(skip_all, name = "bell.repo.find_doorbell")]
    pub async fn find_profile(
        pool: &PgPool,
        owner_id: &str,
    ) -> Result<Option<DoorbellProfile>, BellError> {
        fetch_profile(pool, owner_id, FIND_PROFILE_SQL, "find_doorbell").await
    }

    /// Load the doorbell profile of `owner_id` and hold a share lock on its
    /// settings row until the surrounding transaction ends.
    ///
    /// Settings writers for this owner wait for the transaction; other
    /// owners are unaffected. An owner without a settings row locks nothing.
    #[instrument(skip_all, name = "bell.repo.lock_doorbell")]
    pub async fn lock_profile(
        conn: &mut PgConnection,
        owner_id: &str,
    ) -> Result<Option<DoorbellProfile>, BellError> {
        fetch_profile(conn, owner_id, LOCK_PROFILE_SQL, "lock_doorbell").await
    }
}

async fn fetch_profile<'e, E>(
    executor: E,
    owner_id: &str,
    sql: &'static str,
    operation: &'static str,
) -> Result<Option<DoorbellProfile>, BellError>
where
    E: PgExecutor<'e>,
{
    let start = Instant::now();

    let row = sqlx::query(sql)
        .bind(owner_id)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            metrics::record_db_query(operation, "error", start.elapsed());
            BellError::Database(e.to_string())
        })?;

    metrics::record_db_query(operation, "success", start.elapsed());

    let Some(row) = row else {
        return Ok(None);
    };

    let owner_name: Option<String> = row.try_get("owner_name")?;
    let display_name: Option<String> = row.try_get("display_name")?;
    let availability_enabled: Option<bool> = row.try_get("availability_enabled")?;
    let availability_start: Option<String> = row.try_get("availability_start")?;
    let availability_end: Option<String> = row.try_get("availability_end")?;
    let blocked_ips: Option<Vec<String>> = row.try_get("blocked_ips")?;

    let default_window = AvailabilityWindow::default_hours();
    let window = AvailabilityWindow {
        start: parse_clock(owner_id, availability_start.as_deref(), default_window.start),
        end: parse_clock(owner_id, availability_end.as_deref(), default_window.end),
    };

    Ok(Some(DoorbellProfile {
        owner_id: owner_id.to_string(),
        display_name: display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        owner_name,
        policy: AccessPolicy {
            blocked_addresses: blocked_ips.unwrap_or_default().into_iter().collect(),
            availability_enabled: availability_enabled.unwrap_or(false),
            window,
        },
    }))
}

/// Parse an `HH:MM` (or `HH:MM:SS`) setting, falling back to `default`.
fn parse_clock(owner_id: &str, raw: Option<&str>, default: NaiveTime) -> NaiveTime {
    let Some(raw) = raw else {
        return default;
    };

    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .unwrap_or_else(|e| {
            tracing::warn!(
                target: "bell.repo.doorbell",
                owner_id = %owner_id,
                value = %raw,
                error = %e,
                "Unparseable availability time, using default"
            );
            default
        })
}
