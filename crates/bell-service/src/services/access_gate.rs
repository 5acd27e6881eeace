//! Access gate for doorbell rooms.
//!
//! Decides whether a visitor may use an owner's doorbell from the block list
//! and the availability window. [`check_access`] is pure; [`AccessGate`]
//! loads the owner's policy and supplies the current local time.

use crate::errors::BellError;
use crate::models::{
    AccessPolicy, AvailabilityWindow, DoorbellProfile, RoomInfoResponse, UNKNOWN_OWNER_NAME,
};
use crate::store::SettingsProvider;
use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use common::types::RoomId;
use std::sync::Arc;
use tracing::instrument;

/// Message returned to a blocked visitor.
pub const BLOCKED_MESSAGE: &str = "You have been blocked";

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Blocked,
    /// Outside the owner's availability window.
    Unavailable(AvailabilityWindow),
}

/// Evaluate `policy` for a visitor at local time `now`.
///
/// The block list takes precedence over the availability window.
pub fn check_access(
    owner_id: &str,
    visitor_address: &str,
    policy: &AccessPolicy,
    now: NaiveTime,
) -> AccessDecision {
    if policy.blocked_addresses.contains(visitor_address) {
        tracing::debug!(target: "bell.gate", owner_id = %owner_id, "Visitor address is blocked");
        return AccessDecision::Blocked;
    }

    if policy.availability_enabled && !policy.window.contains(now) {
        return AccessDecision::Unavailable(policy.window);
    }

    AccessDecision::Allowed
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stopped at one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Loads doorbell policies and applies [`check_access`].
#[derive(Clone)]
pub struct AccessGate {
    settings: Arc<dyn SettingsProvider>,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl AccessGate {
    /// Gate on the wall clock. Windows are compared in `offset` local time.
    pub fn new(settings: Arc<dyn SettingsProvider>, offset: FixedOffset) -> Self {
        Self {
            settings,
            offset,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time of day in the availability offset.
    pub fn local_time(&self) -> NaiveTime {
        self.clock.now().with_timezone(&self.offset).time()
    }

    /// Apply [`check_access`] to an already loaded policy at the current
    /// local time.
    ///
    /// Rings are decided here from the policy read inside ring admission.
    pub fn decide(
        &self,
        owner_id: &str,
        visitor_address: &str,
        policy: &AccessPolicy,
    ) -> AccessDecision {
        check_access(owner_id, visitor_address, policy, self.local_time())
    }

    /// Public doorbell info for a visitor.
    ///
    /// # Errors
    ///
    /// - `BellError::NotFound` if the owner has no doorbell
    /// - `BellError::Forbidden` if the visitor is blocked
    #[instrument(skip_all, name = "bell.gate.room_info", fields(room_id = %room))]
    pub async fn room_info(
        &self,
        room: &RoomId,
        visitor_address: &str,
    ) -> Result<RoomInfoResponse, BellError> {
        let DoorbellProfile {
            owner_id,
            display_name,
            owner_name,
            policy,
        } = self
            .settings
            .doorbell_for(room.owner_id())
            .await?
            .ok_or_else(|| BellError::NotFound("Doorbell not found".to_string()))?;

        match check_access(&owner_id, visitor_address, &policy, self.local_time()) {
            AccessDecision::Blocked => Err(BellError::Forbidden(BLOCKED_MESSAGE.to_string())),
            AccessDecision::Unavailable(window) => Ok(RoomInfoResponse {
                display_name,
                available: false,
                owner_name: None,
                message: Some(format!("Available between {}", window)),
            }),
            AccessDecision::Allowed => Ok(RoomInfoResponse {
                display_name,
                available: true,
                owner_name: Some(owner_name.unwrap_or_else(|| UNKNOWN_OWNER_NAME.to_string())),
                message: None,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_DISPLAY_NAME;
    use crate::store::StaticSettings;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn utc_at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    fn policy(blocked: &[&str], availability_enabled: bool) -> AccessPolicy {
        AccessPolicy {
            blocked_addresses: blocked.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            availability_enabled,
            window: AvailabilityWindow::default_hours(),
        }
    }

    fn profile(owner_id: &str, policy: AccessPolicy, owner_name: Option<&str>) -> DoorbellProfile {
        DoorbellProfile {
            owner_id: owner_id.to_string(),
            display_name: "Front Door".to_string(),
            owner_name: owner_name.map(str::to_string),
            policy,
        }
    }

    fn gate_at(settings: StaticSettings, now: DateTime<Utc>) -> AccessGate {
        AccessGate::new(Arc::new(settings), FixedOffset::east_opt(0).unwrap())
            .with_clock(Arc::new(FixedClock(now)))
    }

    #[test]
    fn test_check_access_allows_by_default() {
        assert_eq!(
            check_access("u1", "10.0.0.1", &AccessPolicy::default(), hm(3, 0)),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn test_check_access_blocked_address() {
        let policy = policy(&["10.0.0.9"], false);
        assert_eq!(
            check_access("u1", "10.0.0.9", &policy, hm(12, 0)),
            AccessDecision::Blocked
        );
        assert_eq!(
            check_access("u1", "10.0.0.1", &policy, hm(12, 0)),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn test_check_access_block_wins_over_window() {
        let policy = policy(&["10.0.0.9"], true);
        assert_eq!(
            check_access("u1", "10.0.0.9", &policy, hm(23, 0)),
            AccessDecision::Blocked
        );
    }

    #[test]
    fn test_check_access_window_inclusive() {
        let policy = policy(&[], true);
        assert_eq!(
            check_access("u1", "10.0.0.1", &policy, hm(9, 0)),
            AccessDecision::Allowed
        );
        assert_eq!(
            check_access("u1", "10.0.0.1", &policy, hm(21, 0)),
            AccessDecision::Allowed
        );
        assert_eq!(
            check_access("u1", "10.0.0.1", &policy, hm(22, 0)),
            AccessDecision::Unavailable(AvailabilityWindow::default_hours())
        );
    }

    #[test]
    fn test_check_access_ignores_window_when_disabled() {
        let policy = policy(&[], false);
        assert_eq!(
            check_access("u1", "10.0.0.1", &policy, hm(2, 0)),
            AccessDecision::Allowed
        );
    }

    #[test]
    fn test_local_time_applies_offset() {
        let gate = AccessGate::new(
            Arc::new(StaticSettings::new()),
            FixedOffset::east_opt(-5 * 3600).unwrap(),
        )
        .with_clock(Arc::new(FixedClock(utc_at(3, 30))));

        assert_eq!(gate.local_time(), hm(22, 30));
    }

    #[tokio::test]
    async fn test_room_info_unknown_owner_is_not_found() {
        let gate = gate_at(StaticSettings::new(), utc_at(12, 0));

        let result = gate.room_info(&RoomId::bare("nobody"), "10.0.0.1").await;
        assert!(matches!(result, Err(BellError::NotFound(msg)) if msg == "Doorbell not found"));
    }

    #[tokio::test]
    async fn test_room_info_blocked_visitor() {
        let settings = StaticSettings::new().with_profile(profile(
            "u1",
            policy(&["10.0.0.9"], false),
            Some("Sam"),
        ));
        let gate = gate_at(settings, utc_at(12, 0));

        let result = gate.room_info(&RoomId::bare("u1"), "10.0.0.9").await;
        assert!(matches!(result, Err(BellError::Forbidden(msg)) if msg == BLOCKED_MESSAGE));
    }

    #[tokio::test]
    async fn test_room_info_outside_window() {
        let settings =
            StaticSettings::new().with_profile(profile("u1", policy(&[], true), Some("Sam")));
        let gate = gate_at(settings, utc_at(22, 0));

        let info = gate.room_info(&RoomId::bare("u1"), "10.0.0.1").await.unwrap();
        assert_eq!(
            info,
            RoomInfoResponse {
                display_name: "Front Door".to_string(),
                available: false,
                owner_name: None,
                message: Some("Available between 09:00 - 21:00".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_room_info_available_with_suffixed_room() {
        let owner_id = "3f1c2a9e-6b7d-4e2f-9a10-5c8d7e6f4b3a";
        let settings =
            StaticSettings::new().with_profile(profile(owner_id, policy(&[], true), None));
        let gate = gate_at(settings, utc_at(12, 0));

        let room = RoomId::parse(&format!("{owner_id}-a1b2c3d4")).unwrap();
        let info = gate.room_info(&room, "10.0.0.1").await.unwrap();

        assert!(info.available);
        assert_eq!(info.owner_name.as_deref(), Some(UNKNOWN_OWNER_NAME));
        assert_ne!(info.display_name, DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn test_decide_uses_gate_clock() {
        let gate = gate_at(StaticSettings::new(), utc_at(23, 0));

        assert_eq!(
            gate.decide("u1", "10.0.0.1", &AccessPolicy::default()),
            AccessDecision::Allowed
        );
        assert_eq!(
            gate.decide("u1", "10.0.0.1", &policy(&[], true)),
            AccessDecision::Unavailable(AvailabilityWindow::default_hours())
        );
    }
}
