//! Relay service models.
//!
//! Contains the signaling and call-record domain types plus the JSON
//! request/response bodies of the HTTP surface.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Visitor name recorded when the ring payload carries none.
pub const UNKNOWN_VISITOR_NAME: &str = "Unknown Visitor";

/// Owner name reported when the owner account cannot be found.
pub const UNKNOWN_OWNER_NAME: &str = "Unknown";

/// Doorbell display name used when settings carry none.
pub const DEFAULT_DISPLAY_NAME: &str = "My Doorbell";

/// Payload key carrying the call record id.
pub const PAYLOAD_CALL_ID: &str = "call_id";

/// Payload key carrying the visitor's display name on `ring`.
pub const PAYLOAD_VISITOR_NAME: &str = "visitor_name";

/// Payload key carrying the call duration on `end`.
pub const PAYLOAD_DURATION_SECONDS: &str = "duration_seconds";

// ============================================================================
// Signaling
// ============================================================================

/// Which side of the door sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Visitor,
    Owner,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Visitor => "visitor",
            SenderRole::Owner => "owner",
        }
    }

    /// Parse a wire value; unknown values are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "visitor" => Some(SenderRole::Visitor),
            "owner" => Some(SenderRole::Owner),
            _ => None,
        }
    }

    /// The role whose messages a poller with `raw` role receives.
    ///
    /// `visitor` polls read owner messages; any other value reads visitor
    /// messages.
    pub fn counterpart_of(raw: &str) -> Self {
        if raw == "visitor" {
            SenderRole::Owner
        } else {
            SenderRole::Visitor
        }
    }
}

/// Signaling message kinds relayed between visitor and owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    Offer,
    Answer,
    IceCandidate,
    Ring,
    Accept,
    Reject,
    End,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Offer => "offer",
            MessageType::Answer => "answer",
            MessageType::IceCandidate => "ice-candidate",
            MessageType::Ring => "ring",
            MessageType::Accept => "accept",
            MessageType::Reject => "reject",
            MessageType::End => "end",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "offer" => Some(MessageType::Offer),
            "answer" => Some(MessageType::Answer),
            "ice-candidate" => Some(MessageType::IceCandidate),
            "ring" => Some(MessageType::Ring),
            "accept" => Some(MessageType::Accept),
            "reject" => Some(MessageType::Reject),
            "end" => Some(MessageType::End),
            _ => None,
        }
    }
}

/// A persisted signaling message.
///
/// Immutable once written except for `delivered`, which flips to true once
/// when the opposite role's poll claims it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// Insertion sequence; breaks `created_at` ties.
    #[serde(skip)]
    pub seq: i64,

    pub id: Uuid,

    pub room_id: String,

    #[serde(rename = "sender_type")]
    pub sender_role: SenderRole,

    pub message_type: MessageType,

    pub payload: Map<String, Value>,

    pub created_at: DateTime<Utc>,

    pub delivered: bool,
}

/// A message about to be appended to the log.
#[derive(Debug, Clone)]
pub struct NewSignalingMessage {
    pub id: Uuid,
    pub room_id: String,
    pub sender_role: SenderRole,
    pub message_type: MessageType,
    pub payload: Map<String, Value>,
}

// ============================================================================
// Call records
// ============================================================================

/// Call record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Rung but never accepted. Initial state.
    Missed,

    /// Owner accepted the ring.
    Answered,

    /// Reserved for rejected visitors; no flow writes it today.
    Blocked,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Missed => "missed",
            CallStatus::Answered => "answered",
            CallStatus::Blocked => "blocked",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "missed" => Some(CallStatus::Missed),
            "answered" => Some(CallStatus::Answered),
            "blocked" => Some(CallStatus::Blocked),
            _ => None,
        }
    }
}

/// One call attempt, created per accepted `ring`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub visitor_name: String,
    pub visitor_address: String,
    pub status: CallStatus,
    pub duration_seconds: i32,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a ring creates a call record.
#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub visitor_name: String,
    pub visitor_address: String,
}

/// Per-owner call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    pub total: i64,
    pub answered: i64,
    pub missed: i64,
    pub blocked: i64,
}

// ============================================================================
// Access policy
// ============================================================================

/// Daily availability window, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl AvailabilityWindow {
    /// Default window: 09:00 - 21:00.
    pub fn default_hours() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// Whether `now` falls inside the window.
    ///
    /// A window whose start is after its end spans midnight.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

impl fmt::Display for AvailabilityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Read-only access policy for one owner's doorbell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub blocked_addresses: HashSet<String>,
    pub availability_enabled: bool,
    pub window: AvailabilityWindow,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            blocked_addresses: HashSet::new(),
            availability_enabled: false,
            window: AvailabilityWindow::default_hours(),
        }
    }
}

/// Doorbell settings and owner profile as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorbellProfile {
    pub owner_id: String,
    pub display_name: String,
    pub owner_name: Option<String>,
    pub policy: AccessPolicy,
}

/// The authenticated owner behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSession {
    pub user_id: String,
    pub name: String,
}

// ============================================================================
// HTTP bodies
// ============================================================================

/// Body of `POST /api/signaling/send`.
///
/// Fields are optional so missing values surface as 400 rather than a
/// JSON extraction rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendSignalRequest {
    pub room_id: Option<String>,
    pub sender_type: Option<String>,
    pub message_type: Option<String>,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendSignalResponse {
    pub message_id: Uuid,
}

/// Query of `GET /api/signaling/poll/:room_id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollQuery {
    pub sender_type: Option<String>,
    /// Accepted for protocol compatibility; delivery is tracked by flag.
    pub last_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    pub messages: Vec<SignalingMessage>,
}

/// Body of `POST /api/signaling/end-call`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndCallRequest {
    pub call_id: Option<String>,
    pub duration_seconds: Option<i64>,
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Public doorbell info shown to a visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfoResponse {
    pub display_name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
