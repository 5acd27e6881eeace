//! Store-and-poll signaling relay.
//!
//! Visitors and owners never talk directly. Each side sends messages into a
//! room and polls for the other side's undelivered messages. A poll claims
//! what it returns, so each message reaches at most one poller.
//!
//! `ring`, `accept` and `end` messages also drive the call lifecycle:
//!
//! - a visitor `ring` passes the access gate, gets a call id injected into
//!   its payload and is stored together with its call record; the owner
//!   notification is queued only once both are stored
//! - an owner `accept` carrying a call id marks the call answered
//! - an `end` carrying a call id and duration records the duration
//!
//! Lifecycle updates after a message is stored are best-effort: the message
//! log is authoritative and the sender still gets its message id.

use crate::errors::BellError;
use crate::models::{
    AccessPolicy, MessageType, NewCallRecord, NewSignalingMessage, SendSignalRequest, SenderRole,
    SignalingMessage, PAYLOAD_CALL_ID, PAYLOAD_DURATION_SECONDS, PAYLOAD_VISITOR_NAME, UNKNOWN_VISITOR_NAME,
};
use crate::observability::metrics;
use crate::services::access_gate::{AccessDecision, AccessGate, BLOCKED_MESSAGE};
use crate::services::call_lifecycle::CallLifecycle;
use crate::services::notifier::RingNotification;
use crate::store::MessageStore;
use crate::tasks::NotificationDispatcher;
use common::types::RoomId;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Message for requests lacking a room, sender or message type.
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields";

/// Relay behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions {
    /// Maximum messages claimed by one poll.
    pub page_size: i64,
    /// Reject rings outside the owner's availability window.
    pub enforce_availability_on_ring: bool,
}

/// The signaling relay.
#[derive(Clone)]
pub struct SignalingRelay {
    messages: Arc<dyn MessageStore>,
    gate: AccessGate,
    lifecycle: CallLifecycle,
    notifications: NotificationDispatcher,
    options: RelayOptions,
}

impl SignalingRelay {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        gate: AccessGate,
        lifecycle: CallLifecycle,
        notifications: NotificationDispatcher,
        options: RelayOptions,
    ) -> Self {
        Self {
            messages,
            gate,
            lifecycle,
            notifications,
            options,
        }
    }

    /// Accept a message from one side of a room.
    ///
    /// # Errors
    ///
    /// - `BellError::BadRequest` for missing or unknown fields
    /// - `BellError::Forbidden` when a ring is refused by the access gate;
    ///   nothing is recorded in that case
    #[instrument(skip_all, name = "bell.relay.send", fields(room_id = tracing::field::Empty, message_type = tracing::field::Empty))]
    pub async fn send(
        &self,
        request: SendSignalRequest,
        visitor_address: &str,
    ) -> Result<Uuid, BellError> {
        let (room_id, sender, message_type, payload) = validate_send(request)?;

        tracing::Span::current().record("room_id", room_id.as_str());
        tracing::Span::current().record("message_type", message_type.as_str());

        if message_type == MessageType::Ring && sender == SenderRole::Visitor {
            let (stored, notification) = self.ring(room_id, payload, visitor_address).await?;
            metrics::record_signal_sent(message_type.as_str(), sender.as_str());
            self.notifications.dispatch(notification);
            return Ok(stored.id);
        }

        let stored = self
            .messages
            .append(NewSignalingMessage {
                id: Uuid::new_v4(),
                room_id,
                sender_role: sender,
                message_type,
                payload,
            })
            .await?;

        metrics::record_signal_sent(message_type.as_str(), sender.as_str());

        self.apply_lifecycle(&stored).await;

        Ok(stored.id)
    }

    /// Claim the other side's undelivered messages, oldest first.
    ///
    /// `polling_role` is the caller's role; `visitor` receives owner messages
    /// and any other value receives visitor messages. `last_id` is part of the
    /// protocol but delivery is tracked only by the delivered flag.
    #[instrument(skip_all, name = "bell.relay.poll", fields(room_id = %room_id))]
    pub async fn poll(
        &self,
        room_id: &str,
        polling_role: Option<&str>,
        last_id: Option<&str>,
    ) -> Result<Vec<SignalingMessage>, BellError> {
        let polling_role = polling_role
            .filter(|role| !role.is_empty())
            .ok_or_else(|| BellError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()))?;
        if room_id.trim().is_empty() {
            return Err(BellError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()));
        }

        if let Some(last_id) = last_id {
            tracing::trace!(target: "bell.relay", last_id = %last_id, "Ignoring poll cursor");
        }

        let sender = SenderRole::counterpart_of(polling_role);
        let messages = self
            .messages
            .claim_undelivered(room_id, sender, self.options.page_size)
            .await?;

        metrics::record_poll_batch(messages.len());

        Ok(messages)
    }

    /// Admit a visitor ring and store it with its call record.
    async fn ring(
        &self,
        room_id: String,
        mut payload: Map<String, Value>,
        visitor_address: &str,
    ) -> Result<(SignalingMessage, RingNotification), BellError> {
        let room = parse_room(&room_id)?;
        let owner_id = room.owner_id();

        let visitor_name = payload
            .get(PAYLOAD_VISITOR_NAME)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_VISITOR_NAME)
            .to_string();

        let call_id = Uuid::new_v4();
        payload.insert(
            PAYLOAD_CALL_ID.to_string(),
            Value::String(call_id.to_string()),
        );

        let call = NewCallRecord {
            id: call_id,
            owner_id: owner_id.to_string(),
            visitor_name: visitor_name.clone(),
            visitor_address: visitor_address.to_string(),
        };
        let ring = NewSignalingMessage {
            id: Uuid::new_v4(),
            room_id,
            sender_role: SenderRole::Visitor,
            message_type: MessageType::Ring,
            payload,
        };
        let admit =
            |policy: &AccessPolicy| self.admit_ring(owner_id, visitor_address, policy);

        let opened = self.lifecycle.start_call(call, ring, &admit).await?;

        Ok((
            opened.message,
            RingNotification {
                owner_id: owner_id.to_string(),
                visitor_name,
                call_id: opened.call.id,
            },
        ))
    }

    /// Turn a gate decision into the ring outcome.
    fn admit_ring(
        &self,
        owner_id: &str,
        visitor_address: &str,
        policy: &AccessPolicy,
    ) -> Result<(), BellError> {
        match self.gate.decide(owner_id, visitor_address, policy) {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::Blocked => {
                metrics::record_ring_rejected("blocked");
                tracing::info!(target: "bell.relay", owner_id = %owner_id, "Ring from blocked visitor refused");
                Err(BellError::Forbidden(BLOCKED_MESSAGE.to_string()))
            }
            AccessDecision::Unavailable(window) => {
                if self.options.enforce_availability_on_ring {
                    metrics::record_ring_rejected("unavailable");
                    return Err(BellError::Forbidden(format!(
                        "Available between {}",
                        window
                    )));
                }
                tracing::debug!(
                    target: "bell.relay",
                    owner_id = %owner_id,
                    "Ring outside availability window accepted"
                );
                Ok(())
            }
        }
    }

    /// Apply `accept` and `end` transitions for a stored message.
    async fn apply_lifecycle(&self, message: &SignalingMessage) {
        let Some(call_id) = message
            .payload
            .get(PAYLOAD_CALL_ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        else {
            return;
        };

        let result = match (message.message_type, message.sender_role) {
            (MessageType::Accept, SenderRole::Owner) => {
                self.lifecycle.mark_answered(call_id).await.map(|_| ())
            }
            (MessageType::End, _) => {
                let Some(duration) = message
                    .payload
                    .get(PAYLOAD_DURATION_SECONDS)
                    .and_then(Value::as_i64)
                else {
                    return;
                };
                self.lifecycle.record_end(call_id, duration).await.map(|_| ())
            }
            _ => return,
        };

        if let Err(e) = result {
            warn!(
                target: "bell.relay",
                message_id = %message.id,
                call_id = %call_id,
                error = %e,
                "Call update after stored message failed"
            );
        }
    }
}

fn parse_room(room_id: &str) -> Result<RoomId, BellError> {
    RoomId::parse(room_id).map_err(|e| BellError::BadRequest(format!("Invalid room id: {e}")))
}

/// Check required fields and parse enumerations.
fn validate_send(
    request: SendSignalRequest,
) -> Result<(String, SenderRole, MessageType, Map<String, Value>), BellError> {
    let missing = || BellError::BadRequest(MISSING_FIELDS_MESSAGE.to_string());

    let room_id = request
        .room_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(missing)?;
    let sender_raw = request
        .sender_type
        .filter(|v| !v.is_empty())
        .ok_or_else(missing)?;
    let type_raw = request
        .message_type
        .filter(|v| !v.is_empty())
        .ok_or_else(missing)?;

    let sender = SenderRole::parse(&sender_raw)
        .ok_or_else(|| BellError::BadRequest(format!("Unknown sender_type '{}'", sender_raw)))?;
    let message_type = MessageType::parse(&type_raw)
        .ok_or_else(|| BellError::BadRequest(format!("Unknown message_type '{}'", type_raw)))?;

    let payload = match request.payload {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(BellError::BadRequest(
                "payload must be a JSON object".to_string(),
            ))
        }
    };

    Ok((room_id, sender, message_type, payload))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{
        AccessPolicy, AvailabilityWindow, CallStatus, DoorbellProfile, DEFAULT_DISPLAY_NAME,
    };
    use crate::services::access_gate::FixedClock;
    use crate::store::{
        CallStore, InMemoryCallStore, InMemoryMessageStore, InMemoryRingStore, StaticSettings,
    };
    use chrono::{FixedOffset, TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    const OWNER: &str = "U1";
    const VISITOR_ADDR: &str = "203.0.113.7";

    struct Harness {
        relay: SignalingRelay,
        messages: Arc<InMemoryMessageStore>,
        calls: Arc<InMemoryCallStore>,
        rings: mpsc::Receiver<RingNotification>,
    }

    struct HarnessOptions {
        blocked: Vec<&'static str>,
        availability_enabled: bool,
        utc_hour: u32,
        enforce: bool,
        page_size: i64,
        calls: Option<InMemoryCallStore>,
        messages: Option<InMemoryMessageStore>,
    }

    impl Default for HarnessOptions {
        fn default() -> Self {
            Self {
                blocked: Vec::new(),
                availability_enabled: false,
                utc_hour: 12,
                enforce: false,
                page_size: 50,
                calls: None,
                messages: None,
            }
        }
    }

    fn harness(options: HarnessOptions) -> Harness {
        let messages = Arc::new(options.messages.unwrap_or_default());
        let calls = Arc::new(options.calls.unwrap_or_default());
        let settings = StaticSettings::new().with_profile(DoorbellProfile {
            owner_id: OWNER.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            owner_name: Some("Sam".to_string()),
            policy: AccessPolicy {
                blocked_addresses: options
                    .blocked
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<HashSet<_>>(),
                availability_enabled: options.availability_enabled,
                window: AvailabilityWindow::default_hours(),
            },
        });
        let now = Utc
            .with_ymd_and_hms(2026, 3, 14, options.utc_hour, 0, 0)
            .unwrap();
        let settings = Arc::new(settings);
        let gate = AccessGate::new(settings.clone(), FixedOffset::east_opt(0).unwrap())
            .with_clock(Arc::new(FixedClock(now)));
        let ring_store = InMemoryRingStore::new(settings, calls.clone(), messages.clone());
        let (dispatcher, rings) = NotificationDispatcher::channel(16);

        let relay = SignalingRelay::new(
            messages.clone(),
            gate,
            CallLifecycle::new(calls.clone(), Arc::new(ring_store)),
            dispatcher,
            RelayOptions {
                page_size: options.page_size,
                enforce_availability_on_ring: options.enforce,
            },
        );

        Harness {
            relay,
            messages,
            calls,
            rings,
        }
    }

    fn request(sender: &str, message_type: &str, payload: Value) -> SendSignalRequest {
        SendSignalRequest {
            room_id: Some(OWNER.to_string()),
            sender_type: Some(sender.to_string()),
            message_type: Some(message_type.to_string()),
            payload: Some(payload),
        }
    }

    #[tokio::test]
    async fn test_send_missing_fields_is_bad_request() {
        let h = harness(HarnessOptions::default());

        for request in [
            SendSignalRequest {
                room_id: None,
                ..request("visitor", "ring", json!({}))
            },
            SendSignalRequest {
                sender_type: Some(String::new()),
                ..request("visitor", "ring", json!({}))
            },
            SendSignalRequest {
                message_type: None,
                ..request("visitor", "ring", json!({}))
            },
        ] {
            let result = h.relay.send(request, VISITOR_ADDR).await;
            assert!(
                matches!(result, Err(BellError::BadRequest(msg)) if msg == MISSING_FIELDS_MESSAGE)
            );
        }
        assert!(h.messages.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_unknown_enumerations_are_bad_request() {
        let h = harness(HarnessOptions::default());

        let result = h
            .relay
            .send(request("doorman", "offer", json!({})), VISITOR_ADDR)
            .await;
        assert!(matches!(result, Err(BellError::BadRequest(_))));

        let result = h
            .relay
            .send(request("visitor", "hangup", json!({})), VISITOR_ADDR)
            .await;
        assert!(matches!(result, Err(BellError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_send_rejects_non_object_payload() {
        let h = harness(HarnessOptions::default());

        let result = h
            .relay
            .send(request("visitor", "offer", json!([1, 2])), VISITOR_ADDR)
            .await;
        assert!(matches!(result, Err(BellError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_ring_starts_call_and_queues_notification() {
        let mut h = harness(HarnessOptions::default());

        h.relay
            .send(
                request("visitor", "ring", json!({"visitor_name": "Alex"})),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        let polled = h.relay.poll(OWNER, Some("owner"), None).await.unwrap();
        assert_eq!(polled.len(), 1);
        let ring = polled.first().unwrap();
        assert_eq!(ring.message_type, MessageType::Ring);
        assert_eq!(ring.payload["visitor_name"], "Alex");

        let call_id: Uuid = ring.payload[PAYLOAD_CALL_ID]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        let call = h.calls.get(call_id).await.unwrap();
        assert_eq!(call.status, CallStatus::Missed);
        assert_eq!(call.owner_id, OWNER);
        assert_eq!(call.visitor_address, VISITOR_ADDR);

        let notification = h.rings.try_recv().unwrap();
        assert_eq!(notification.call_id, call_id);
        assert_eq!(notification.visitor_name, "Alex");
        assert_eq!(notification.owner_id, OWNER);
    }

    #[tokio::test]
    async fn test_ring_without_name_uses_unknown_visitor() {
        let mut h = harness(HarnessOptions::default());

        h.relay
            .send(request("visitor", "ring", Value::Null), VISITOR_ADDR)
            .await
            .unwrap();

        let records = h.calls.list_for_owner(OWNER, 10).await.unwrap();
        assert_eq!(records.first().unwrap().visitor_name, UNKNOWN_VISITOR_NAME);
        assert_eq!(h.rings.try_recv().unwrap().visitor_name, UNKNOWN_VISITOR_NAME);
    }

    #[tokio::test]
    async fn test_ring_from_suffixed_room_uses_owner_id() {
        let owner_id = "3f1c2a9e-6b7d-4e2f-9a10-5c8d7e6f4b3a";
        let h = harness(HarnessOptions::default());
        let room_id = format!("{owner_id}-a1b2c3d4");

        h.relay
            .send(
                SendSignalRequest {
                    room_id: Some(room_id.clone()),
                    ..request("visitor", "ring", json!({}))
                },
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        assert_eq!(h.calls.list_for_owner(owner_id, 10).await.unwrap().len(), 1);
        // Messages stay keyed by the room the visitor used.
        let polled = h.relay.poll(&room_id, Some("owner"), None).await.unwrap();
        assert_eq!(polled.len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_ring_records_nothing() {
        let mut h = harness(HarnessOptions {
            blocked: vec![VISITOR_ADDR],
            ..Default::default()
        });

        let result = h
            .relay
            .send(
                request("visitor", "ring", json!({"visitor_name": "Alex"})),
                VISITOR_ADDR,
            )
            .await;

        assert!(matches!(result, Err(BellError::Forbidden(msg)) if msg == BLOCKED_MESSAGE));
        assert!(h.calls.is_empty().await);
        assert!(h.messages.all().await.is_empty());
        assert!(h.rings.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_ring_append_leaves_no_call_or_notification() {
        let mut h = harness(HarnessOptions {
            messages: Some(InMemoryMessageStore::failing_appends()),
            ..Default::default()
        });

        let result = h
            .relay
            .send(
                request("visitor", "ring", json!({"visitor_name": "Alex"})),
                VISITOR_ADDR,
            )
            .await;

        assert!(matches!(result, Err(BellError::Database(_))));
        assert_eq!(h.calls.len().await, 0);
        assert!(h.rings.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_retried_ring_creates_one_call_per_stored_ring() {
        let h = harness(HarnessOptions::default());

        for _ in 0..2 {
            h.relay
                .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
                .await
                .unwrap();
        }

        let stored = h.messages.all().await;
        let calls = h.calls.list_for_owner(OWNER, 10).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(calls.len(), 2);
        for message in &stored {
            let call_id: Uuid = message.payload[PAYLOAD_CALL_ID]
                .as_str()
                .unwrap()
                .parse()
                .unwrap();
            assert!(calls.iter().any(|call| call.id == call_id));
        }
    }

    #[test]
    fn test_parse_room_reports_invalid_room() {
        let result = parse_room("");
        assert!(
            matches!(result, Err(BellError::BadRequest(msg)) if msg == "Invalid room id: room id is empty")
        );
        assert_eq!(parse_room(OWNER).unwrap().owner_id(), OWNER);
    }

    #[tokio::test]
    async fn test_blocked_address_may_still_send_non_ring_messages() {
        let h = harness(HarnessOptions {
            blocked: vec![VISITOR_ADDR],
            ..Default::default()
        });

        h.relay
            .send(request("visitor", "offer", json!({"sdp": "v=0"})), VISITOR_ADDR)
            .await
            .unwrap();

        assert_eq!(h.messages.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ring_outside_window_succeeds_by_default() {
        let h = harness(HarnessOptions {
            availability_enabled: true,
            utc_hour: 22,
            ..Default::default()
        });

        h.relay
            .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
            .await
            .unwrap();

        assert_eq!(h.calls.len().await, 1);
    }

    #[tokio::test]
    async fn test_ring_outside_window_refused_when_enforced() {
        let h = harness(HarnessOptions {
            availability_enabled: true,
            utc_hour: 22,
            enforce: true,
            ..Default::default()
        });

        let result = h
            .relay
            .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
            .await;

        assert!(
            matches!(result, Err(BellError::Forbidden(msg)) if msg == "Available between 09:00 - 21:00")
        );
        assert!(h.calls.is_empty().await);
        assert!(h.messages.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_owner_ring_does_not_start_call() {
        let h = harness(HarnessOptions::default());

        h.relay
            .send(request("owner", "ring", json!({})), VISITOR_ADDR)
            .await
            .unwrap();

        assert!(h.calls.is_empty().await);
    }

    #[tokio::test]
    async fn test_accept_from_owner_marks_answered() {
        let h = harness(HarnessOptions::default());
        h.relay
            .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
            .await
            .unwrap();
        let ring = h.relay.poll(OWNER, Some("owner"), None).await.unwrap();
        let call_id = ring.first().unwrap().payload[PAYLOAD_CALL_ID].clone();

        h.relay
            .send(
                request("owner", "accept", json!({ "call_id": call_id })),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        let stats = h.calls.stats_for_owner(OWNER).await.unwrap();
        assert_eq!((stats.answered, stats.missed), (1, 0));

        let to_visitor = h.relay.poll(OWNER, Some("visitor"), None).await.unwrap();
        assert_eq!(to_visitor.len(), 1);
        assert_eq!(to_visitor.first().unwrap().message_type, MessageType::Accept);
    }

    #[tokio::test]
    async fn test_accept_from_visitor_does_not_answer() {
        let h = harness(HarnessOptions::default());
        h.relay
            .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
            .await
            .unwrap();
        let call_id = h.calls.list_for_owner(OWNER, 1).await.unwrap().first().unwrap().id;

        h.relay
            .send(
                request("visitor", "accept", json!({ "call_id": call_id.to_string() })),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        assert_eq!(h.calls.get(call_id).await.unwrap().status, CallStatus::Missed);
    }

    #[tokio::test]
    async fn test_accept_for_unknown_call_still_stores_message() {
        let h = harness(HarnessOptions::default());

        h.relay
            .send(
                request(
                    "owner",
                    "accept",
                    json!({ "call_id": Uuid::new_v4().to_string() }),
                ),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        assert_eq!(h.messages.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_status_update_does_not_fail_send() {
        let h = harness(HarnessOptions {
            calls: Some(InMemoryCallStore::failing_updates()),
            ..Default::default()
        });

        let message_id = h
            .relay
            .send(
                request(
                    "owner",
                    "accept",
                    json!({ "call_id": Uuid::new_v4().to_string() }),
                ),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        let stored = h.messages.all().await;
        assert_eq!(stored.first().unwrap().id, message_id);
    }

    #[tokio::test]
    async fn test_end_message_records_duration() {
        let h = harness(HarnessOptions::default());
        h.relay
            .send(request("visitor", "ring", json!({})), VISITOR_ADDR)
            .await
            .unwrap();
        let call_id = h.calls.list_for_owner(OWNER, 1).await.unwrap().first().unwrap().id;

        h.relay
            .send(
                request(
                    "visitor",
                    "end",
                    json!({ "call_id": call_id.to_string(), "duration_seconds": 73 }),
                ),
                VISITOR_ADDR,
            )
            .await
            .unwrap();

        let call = h.calls.get(call_id).await.unwrap();
        assert_eq!(call.duration_seconds, 73);
        assert_eq!(call.status, CallStatus::Missed);
    }

    #[tokio::test]
    async fn test_poll_never_redelivers() {
        let h = harness(HarnessOptions::default());
        for candidate in 0..3 {
            h.relay
                .send(
                    request("owner", "ice-candidate", json!({ "n": candidate })),
                    VISITOR_ADDR,
                )
                .await
                .unwrap();
        }

        let first = h.relay.poll(OWNER, Some("visitor"), None).await.unwrap();
        let second = h.relay.poll(OWNER, Some("visitor"), None).await.unwrap();

        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
        assert!(first
            .windows(2)
            .all(|pair| matches!(pair, [a, b] if a.created_at <= b.created_at)));
        let order: Vec<i64> = first
            .iter()
            .filter_map(|m| m.payload.get("n").and_then(Value::as_i64))
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_poll_does_not_return_own_messages() {
        let h = harness(HarnessOptions::default());
        h.relay
            .send(request("visitor", "offer", json!({})), VISITOR_ADDR)
            .await
            .unwrap();

        assert!(h
            .relay
            .poll(OWNER, Some("visitor"), None)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            h.relay
                .poll(OWNER, Some("owner"), None)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_poll_unknown_role_reads_visitor_messages() {
        let h = harness(HarnessOptions::default());
        h.relay
            .send(request("visitor", "offer", json!({})), VISITOR_ADDR)
            .await
            .unwrap();

        let polled = h.relay.poll(OWNER, Some("doorman"), None).await.unwrap();
        assert_eq!(polled.len(), 1);
    }

    #[tokio::test]
    async fn test_poll_is_capped_by_page_size() {
        let h = harness(HarnessOptions {
            page_size: 2,
            ..Default::default()
        });
        for _ in 0..5 {
            h.relay
                .send(request("owner", "ice-candidate", json!({})), VISITOR_ADDR)
                .await
                .unwrap();
        }

        assert_eq!(
            h.relay.poll(OWNER, Some("visitor"), None).await.unwrap().len(),
            2
        );
        assert_eq!(
            h.relay.poll(OWNER, Some("visitor"), None).await.unwrap().len(),
            2
        );
        assert_eq!(
            h.relay.poll(OWNER, Some("visitor"), None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_poll_ignores_last_id() {
        let h = harness(HarnessOptions::default());
        let first = h
            .relay
            .send(request("owner", "offer", json!({})), VISITOR_ADDR)
            .await
            .unwrap();
        h.relay
            .send(request("owner", "ice-candidate", json!({})), VISITOR_ADDR)
            .await
            .unwrap();

        let polled = h
            .relay
            .poll(OWNER, Some("visitor"), Some(&first.to_string()))
            .await
            .unwrap();
        assert_eq!(polled.len(), 2);
    }

    #[tokio::test]
    async fn test_poll_requires_sender_type() {
        let h = harness(HarnessOptions::default());

        let result = h.relay.poll(OWNER, None, None).await;
        assert!(matches!(result, Err(BellError::BadRequest(_))));
    }
}
