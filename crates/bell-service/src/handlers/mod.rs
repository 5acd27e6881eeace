//! HTTP request handlers for the relay service.

pub mod calls;
pub mod health;
pub mod metrics;
pub mod rooms;
pub mod signaling;

pub use calls::{call_stats, delete_call, list_calls};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use rooms::room_info;
pub use signaling::{end_call, poll_signals, send_signal};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Address recorded when the peer address is unavailable.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Resolve the visitor's network address.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry wins;
/// otherwise the TCP peer address is used.
pub fn visitor_address(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.split(',').next())
            .map(str::trim)
            .filter(|addr| !addr.is_empty());

        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support {
    use crate::config::Config;
    use crate::models::{
        AccessPolicy, AvailabilityWindow, CallRecord, DoorbellProfile, NewCallRecord, OwnerSession,
    };
    use crate::routes::AppState;
    use crate::services::access_gate::FixedClock;
    use crate::services::{AccessGate, CallHistory, CallLifecycle, RelayOptions, SignalingRelay};
    use crate::store::{
        CallStore, InMemoryCallStore, InMemoryMessageStore, InMemoryRingStore, StaticSessions,
        StaticSettings,
    };
    use crate::tasks::NotificationDispatcher;
    use axum::body::Body;
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use sqlx::postgres::PgPoolOptions;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    pub const OWNER_ID: &str = "owner-1";
    pub const SESSION_TOKEN: &str = "session-1";
    pub const BLOCKED_ADDRESS: &str = "198.51.100.66";

    pub struct TestApp {
        pub state: Arc<AppState>,
        pub calls: Arc<InMemoryCallStore>,
        pub messages: Arc<InMemoryMessageStore>,
    }

    /// App state over in-memory stores with one owner whose doorbell blocks
    /// `BLOCKED_ADDRESS` and is available 09:00 - 21:00 UTC. The clock reads
    /// `utc_hour`:00.
    pub fn test_app(utc_hour: u32) -> TestApp {
        let config = Config::from_vars(&HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/bell_unit".to_string(),
        )]))
        .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        let settings = StaticSettings::new().with_profile(DoorbellProfile {
            owner_id: OWNER_ID.to_string(),
            display_name: "Front Door".to_string(),
            owner_name: Some("Sam".to_string()),
            policy: AccessPolicy {
                blocked_addresses: HashSet::from([BLOCKED_ADDRESS.to_string()]),
                availability_enabled: true,
                window: AvailabilityWindow::default_hours(),
            },
        });
        let sessions = StaticSessions::new().with_session(
            SESSION_TOKEN,
            OwnerSession {
                user_id: OWNER_ID.to_string(),
                name: "Sam".to_string(),
            },
        );

        let messages = Arc::new(InMemoryMessageStore::new());
        let calls = Arc::new(InMemoryCallStore::new());
        let now = Utc.with_ymd_and_hms(2026, 3, 14, utc_hour, 0, 0).unwrap();
        let settings = Arc::new(settings);
        let gate = AccessGate::new(settings.clone(), config.availability_offset)
            .with_clock(Arc::new(FixedClock(now)));
        let rings = InMemoryRingStore::new(settings, calls.clone(), messages.clone());
        let lifecycle = CallLifecycle::new(calls.clone(), Arc::new(rings));
        let (dispatcher, _receiver) = NotificationDispatcher::channel(16);

        let relay = SignalingRelay::new(
            messages.clone(),
            gate.clone(),
            lifecycle.clone(),
            dispatcher,
            RelayOptions {
                page_size: config.poll_page_size,
                enforce_availability_on_ring: config.enforce_availability_on_ring,
            },
        );
        let history = CallHistory::new(calls.clone(), config.call_history_limit);

        let state = Arc::new(AppState {
            pool,
            config,
            relay,
            gate,
            lifecycle,
            history,
            sessions: Arc::new(sessions),
        });

        TestApp {
            state,
            calls,
            messages,
        }
    }

    /// Store a `missed` call record directly.
    pub async fn seed_call(
        app: &TestApp,
        owner_id: &str,
        visitor_name: &str,
        visitor_address: &str,
    ) -> CallRecord {
        app.calls
            .create(NewCallRecord {
                id: uuid::Uuid::new_v4(),
                owner_id: owner_id.to_string(),
                visitor_name: visitor_name.to_string(),
                visitor_address: visitor_address.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo("203.0.113.7:51000".parse().unwrap())
    }

    #[test]
    fn test_visitor_address_uses_peer_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.9.9.9".parse().unwrap());

        assert_eq!(
            visitor_address(&headers, Some(&peer()), false),
            "203.0.113.7"
        );
    }

    #[test]
    fn test_visitor_address_trusts_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.9.9.9, 172.16.0.1".parse().unwrap());

        assert_eq!(visitor_address(&headers, Some(&peer()), true), "10.9.9.9");
    }

    #[test]
    fn test_visitor_address_falls_back_without_forwarded_header() {
        assert_eq!(
            visitor_address(&HeaderMap::new(), Some(&peer()), true),
            "203.0.113.7"
        );
        assert_eq!(
            visitor_address(&HeaderMap::new(), None, false),
            UNKNOWN_ADDRESS
        );
    }
}
