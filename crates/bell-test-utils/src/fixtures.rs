//! Database fixtures for the tables the relay reads but does not own.

use chrono::{Duration, NaiveTime, Timelike, Utc};
use sqlx::PgPool;

/// Doorbell settings row to seed.
#[derive(Debug, Clone)]
pub struct DoorbellFixture {
    pub display_name: String,
    pub availability_enabled: bool,
    pub availability_start: String,
    pub availability_end: String,
    pub blocked_ips: Vec<String>,
}

impl Default for DoorbellFixture {
    fn default() -> Self {
        Self {
            display_name: "Front Door".to_string(),
            availability_enabled: false,
            availability_start: "09:00".to_string(),
            availability_end: "21:00".to_string(),
            blocked_ips: Vec::new(),
        }
    }
}

impl DoorbellFixture {
    pub fn blocking(mut self, address: &str) -> Self {
        self.blocked_ips.push(address.to_string());
        self
    }

    /// Enable a one hour window starting two hours from now (UTC), so the
    /// current time is outside it.
    pub fn unavailable_now(mut self) -> Self {
        let start = (Utc::now() + Duration::hours(2)).time();
        let end = start + Duration::hours(1);
        self.availability_enabled = true;
        self.availability_start = clock(start);
        self.availability_end = clock(end);
        self
    }
}

fn clock(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Insert an owner account.
pub async fn seed_owner(pool: &PgPool, owner_id: &str, name: &str) -> Result<(), anyhow::Error> {
    sqlx::query("INSERT INTO users (id, email, name) VALUES ($1, $2, $3)")
        .bind(owner_id)
        .bind(format!("{owner_id}@scanbell.test"))
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert a session for `owner_id` that expires `ttl` from now.
///
/// A negative `ttl` seeds an already expired session.
pub async fn seed_session(
    pool: &PgPool,
    token: &str,
    owner_id: &str,
    ttl: Duration,
) -> Result<(), anyhow::Error> {
    sqlx::query("INSERT INTO user_sessions (session_token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(token)
        .bind(owner_id)
        .bind(Utc::now() + ttl)
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert doorbell settings for `owner_id`.
pub async fn seed_doorbell(
    pool: &PgPool,
    owner_id: &str,
    doorbell: &DoorbellFixture,
) -> Result<(), anyhow::Error> {
    sqlx::query(
        r#"
        INSERT INTO doorbell_settings (
            user_id, display_name, availability_enabled,
            availability_start, availability_end, blocked_ips
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(owner_id)
    .bind(&doorbell.display_name)
    .bind(doorbell.availability_enabled)
    .bind(&doorbell.availability_start)
    .bind(&doorbell.availability_end)
    .bind(&doorbell.blocked_ips)
    .execute(pool)
    .await?;
    Ok(())
}

/// Register a push subscription id for `owner_id`.
pub async fn seed_push_token(
    pool: &PgPool,
    owner_id: &str,
    token: &str,
) -> Result<(), anyhow::Error> {
    sqlx::query("INSERT INTO push_subscriptions (user_id, token, platform) VALUES ($1, $2, 'web')")
        .bind(owner_id)
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Seed an owner with a live session and default doorbell settings.
pub async fn seed_doorbell_owner(
    pool: &PgPool,
    owner_id: &str,
    name: &str,
    session_token: &str,
    doorbell: &DoorbellFixture,
) -> Result<(), anyhow::Error> {
    seed_owner(pool, owner_id, name).await?;
    seed_session(pool, session_token, owner_id, Duration::days(7)).await?;
    seed_doorbell(pool, owner_id, doorbell).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_now_excludes_current_time() {
        let doorbell = DoorbellFixture::default().unavailable_now();
        let start = NaiveTime::parse_from_str(&doorbell.availability_start, "%H:%M").unwrap();
        let end = NaiveTime::parse_from_str(&doorbell.availability_end, "%H:%M").unwrap();
        let now = Utc::now().time();

        let inside = if start <= end {
            start <= now && now <= end
        } else {
            now >= start || now <= end
        };
        assert!(doorbell.availability_enabled);
        assert!(!inside);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_seed_doorbell_owner(pool: PgPool) -> Result<(), anyhow::Error> {
        seed_doorbell_owner(
            &pool,
            "owner-fixture",
            "Sam",
            "fixture-token",
            &DoorbellFixture::default().blocking("198.51.100.1"),
        )
        .await?;

        let blocked: Vec<String> =
            sqlx::query_scalar("SELECT blocked_ips FROM doorbell_settings WHERE user_id = $1")
                .bind("owner-fixture")
                .fetch_one(&pool)
                .await?;
        assert_eq!(blocked, vec!["198.51.100.1".to_string()]);

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions")
            .fetch_one(&pool)
            .await?;
        assert_eq!(sessions, 1);

        Ok(())
    }
}
