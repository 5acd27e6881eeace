//! Relay service configuration.
//!
//! Configuration is loaded from environment variables. The database URL and
//! the push provider API key are redacted in Debug output.

use chrono::FixedOffset;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default number of messages returned by a single poll.
pub const DEFAULT_POLL_PAGE_SIZE: i64 = 50;

/// Upper bound for `POLL_PAGE_SIZE`.
pub const MAX_POLL_PAGE_SIZE: i64 = 500;

/// Default number of call records returned by the history endpoint.
pub const DEFAULT_CALL_HISTORY_LIMIT: i64 = 100;

/// Upper bound for `CALL_HISTORY_LIMIT`.
pub const MAX_CALL_HISTORY_LIMIT: i64 = 1000;

/// Largest UTC offset accepted for availability windows (14 hours).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Default OneSignal notification endpoint.
pub const DEFAULT_ONESIGNAL_API_URL: &str = "https://onesignal.com/api/v1/notifications";

/// Default timeout for a single notification delivery.
pub const DEFAULT_NOTIFICATION_TIMEOUT_SECONDS: u64 = 10;

/// Default capacity of the notification queue.
pub const DEFAULT_NOTIFICATION_QUEUE_CAPACITY: usize = 256;

/// Default number of notification deliveries in flight.
pub const DEFAULT_NOTIFICATION_CONCURRENCY: usize = 8;

/// Relay service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum messages returned per poll.
    pub poll_page_size: i64,

    /// Maximum call records returned by the history endpoint.
    pub call_history_limit: i64,

    /// Whether a ring outside the availability window is rejected.
    /// Off by default: only the room info read enforces the window.
    pub enforce_availability_on_ring: bool,

    /// Offset applied to UTC before comparing against availability windows.
    pub availability_offset: FixedOffset,

    /// Use the first `X-Forwarded-For` entry as the visitor address.
    pub trust_forwarded_for: bool,

    /// Allowed CORS origins; `["*"]` allows any origin.
    pub cors_origins: Vec<String>,

    /// Push notification settings.
    pub notifications: NotificationConfig,
}

/// Push notification delivery settings.
#[derive(Clone)]
pub struct NotificationConfig {
    /// OneSignal application id.
    pub onesignal_app_id: String,

    /// OneSignal REST API key. Notifications are disabled when unset.
    pub onesignal_api_key: Option<SecretString>,

    /// OneSignal notifications endpoint.
    pub onesignal_api_url: String,

    /// Timeout for one delivery attempt.
    pub timeout: Duration,

    /// Bounded queue capacity; jobs beyond it are dropped.
    pub queue_capacity: usize,

    /// Deliveries allowed in flight at once.
    pub concurrency: usize,
}

impl NotificationConfig {
    /// Whether a push provider is configured.
    pub fn is_enabled(&self) -> bool {
        self.onesignal_api_key.is_some()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("poll_page_size", &self.poll_page_size)
            .field("call_history_limit", &self.call_history_limit)
            .field(
                "enforce_availability_on_ring",
                &self.enforce_availability_on_ring,
            )
            .field("availability_offset", &self.availability_offset)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("cors_origins", &self.cors_origins)
            .field("notifications", &self.notifications)
            .finish()
    }
}

impl fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("onesignal_app_id", &self.onesignal_app_id)
            .field(
                "onesignal_api_key",
                &self.onesignal_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("onesignal_api_url", &self.onesignal_api_url)
            .field("timeout", &self.timeout)
            .field("queue_capacity", &self.queue_capacity)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid poll page size configuration: {0}")]
    InvalidPollPageSize(String),

    #[error("Invalid call history limit configuration: {0}")]
    InvalidCallHistoryLimit(String),

    #[error("Invalid availability offset configuration: {0}")]
    InvalidAvailabilityOffset(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),

    #[error("Invalid notification configuration: {0}")]
    InvalidNotification(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let poll_page_size = parse_bounded(
            vars,
            "POLL_PAGE_SIZE",
            DEFAULT_POLL_PAGE_SIZE,
            MAX_POLL_PAGE_SIZE,
        )
        .map_err(ConfigError::InvalidPollPageSize)?;

        let call_history_limit = parse_bounded(
            vars,
            "CALL_HISTORY_LIMIT",
            DEFAULT_CALL_HISTORY_LIMIT,
            MAX_CALL_HISTORY_LIMIT,
        )
        .map_err(ConfigError::InvalidCallHistoryLimit)?;

        let enforce_availability_on_ring =
            parse_bool(vars, "ENFORCE_AVAILABILITY_ON_RING", false)?;
        let trust_forwarded_for = parse_bool(vars, "TRUST_FORWARDED_FOR", false)?;

        let availability_offset = if let Some(value_str) =
            vars.get("AVAILABILITY_UTC_OFFSET_MINUTES")
        {
            let minutes: i32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidAvailabilityOffset(format!(
                    "AVAILABILITY_UTC_OFFSET_MINUTES must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
                return Err(ConfigError::InvalidAvailabilityOffset(format!(
                    "AVAILABILITY_UTC_OFFSET_MINUTES must be within +/-{}, got {}",
                    MAX_UTC_OFFSET_MINUTES, minutes
                )));
            }

            FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                ConfigError::InvalidAvailabilityOffset(format!(
                    "AVAILABILITY_UTC_OFFSET_MINUTES out of range: {}",
                    minutes
                ))
            })?
        } else {
            FixedOffset::east_opt(0).ok_or_else(|| {
                ConfigError::InvalidAvailabilityOffset("UTC offset unavailable".to_string())
            })?
        };

        let cors_origins = vars
            .get("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let notifications = NotificationConfig::from_vars(vars)?;

        Ok(Config {
            database_url,
            bind_address,
            poll_page_size,
            call_history_limit,
            enforce_availability_on_ring,
            availability_offset,
            trust_forwarded_for,
            cors_origins,
            notifications,
        })
    }
}

impl NotificationConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let onesignal_app_id = vars.get("ONESIGNAL_APP_ID").cloned().unwrap_or_default();

        let onesignal_api_key = vars
            .get("ONESIGNAL_API_KEY")
            .filter(|key| !key.is_empty())
            .map(|key| SecretString::from(key.clone()));

        if onesignal_api_key.is_some() && onesignal_app_id.is_empty() {
            return Err(ConfigError::InvalidNotification(
                "ONESIGNAL_APP_ID is required when ONESIGNAL_API_KEY is set".to_string(),
            ));
        }

        let onesignal_api_url = vars
            .get("ONESIGNAL_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ONESIGNAL_API_URL.to_string());

        let timeout_seconds = parse_positive(
            vars,
            "NOTIFICATION_TIMEOUT_SECONDS",
            DEFAULT_NOTIFICATION_TIMEOUT_SECONDS,
        )?;
        let queue_capacity = parse_positive(
            vars,
            "NOTIFICATION_QUEUE_CAPACITY",
            DEFAULT_NOTIFICATION_QUEUE_CAPACITY as u64,
        )?;
        let concurrency = parse_positive(
            vars,
            "NOTIFICATION_CONCURRENCY",
            DEFAULT_NOTIFICATION_CONCURRENCY as u64,
        )?;

        Ok(NotificationConfig {
            onesignal_app_id,
            onesignal_api_key,
            onesignal_api_url,
            timeout: Duration::from_secs(timeout_seconds),
            queue_capacity: queue_capacity as usize,
            concurrency: concurrency as usize,
        })
    }
}

/// Parse an integer in `1..=max`, falling back to `default` when unset.
fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: i64,
    max: i64,
) -> Result<i64, String> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: i64 = value_str.parse().map_err(|e| {
        format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        )
    })?;

    if value <= 0 {
        return Err(format!("{} must be greater than 0", name));
    }

    if value > max {
        return Err(format!("{} must not exceed {}, got {}", name, max, value));
    }

    Ok(value)
}

fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidNotification(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidNotification(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

fn parse_bool(
    vars: &HashMap<String, String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(name).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(v) => Err(ConfigError::InvalidBool(format!(
            "{} must be true or false, got '{}'",
            name, v
        ))),
    }
}
