//! In-memory store implementations.
//!
//! Used by unit tests and local wiring. Each store holds its state behind a
//! single async mutex, so a claim is one critical section and has the same
//! at-most-once behavior as the PostgreSQL claim statement.

use super::{
    CallStore, MessageStore, OpenedRing, RingStore, SessionResolver, SettingsProvider,
    SubscriptionStore,
};
use crate::errors::BellError;
use crate::models::{
    AccessPolicy, CallRecord, CallStats, CallStatus, DoorbellProfile, NewCallRecord, NewSignalingMessage,
    OwnerSession, SenderRole, SignalingMessage,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MessageLog {
    next_seq: i64,
    last_created_at: Option<DateTime<Utc>>,
    messages: Vec<SignalingMessage>,
}

/// In-memory signaling log.
#[derive(Default)]
pub struct InMemoryMessageStore {
    log: Mutex<MessageLog>,
    fail_appends: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose appends fail.
    pub fn failing_appends() -> Self {
        Self {
            log: Mutex::new(MessageLog::default()),
            fail_appends: AtomicBool::new(true),
        }
    }

    /// Snapshot of every stored message in insertion order.
    pub async fn all(&self) -> Vec<SignalingMessage> {
        self.log.lock().await.messages.clone()
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: NewSignalingMessage) -> Result<SignalingMessage, BellError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(BellError::Database("append rejected".to_string()));
        }

        let mut log = self.log.lock().await;

        log.next_seq += 1;
        // Timestamps never go backwards within the log.
        let now = Utc::now();
        let created_at = match log.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        log.last_created_at = Some(created_at);

        let stored = SignalingMessage {
            seq: log.next_seq,
            id: message.id,
            room_id: message.room_id,
            sender_role: message.sender_role,
            message_type: message.message_type,
            payload: message.payload,
            created_at,
            delivered: false,
        };
        log.messages.push(stored.clone());

        Ok(stored)
    }

    async fn claim_undelivered(
        &self,
        room_id: &str,
        sender: SenderRole,
        limit: i64,
    ) -> Result<Vec<SignalingMessage>, BellError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut log = self.log.lock().await;

        let mut claimable: Vec<&mut SignalingMessage> = log
            .messages
            .iter_mut()
            .filter(|m| m.room_id == room_id && m.sender_role == sender && !m.delivered)
            .collect();
        claimable.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.seq.cmp(&b.seq)));

        Ok(claimable
            .into_iter()
            .take(limit)
            .map(|message| {
                message.delivered = true;
                message.clone()
            })
            .collect())
    }
}

/// In-memory call records.
#[derive(Default)]
pub struct InMemoryCallStore {
    records: Mutex<HashMap<Uuid, CallRecord>>,
    fail_updates: AtomicBool,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose status and duration updates fail.
    pub fn failing_updates() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_updates: AtomicBool::new(true),
        }
    }

    pub async fn get(&self, call_id: Uuid) -> Option<CallRecord> {
        self.records.lock().await.get(&call_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn check_updates(&self) -> Result<(), BellError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(BellError::Database("update rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl CallStore for InMemoryCallStore {
    async fn create(&self, record: NewCallRecord) -> Result<CallRecord, BellError> {
        let mut records = self.records.lock().await;

        // Keep creation times strictly increasing so newest-first is stable
        let latest = records.values().map(|r| r.created_at).max();
        let created_at = match latest {
            Some(latest) if latest >= Utc::now() => latest + chrono::Duration::microseconds(1),
            _ => Utc::now(),
        };

        let stored = CallRecord {
            id: record.id,
            owner_id: record.owner_id,
            visitor_name: record.visitor_name,
            visitor_address: record.visitor_address,
            status: CallStatus::Missed,
            duration_seconds: 0,
            created_at,
        };
        records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn set_status(&self, call_id: Uuid, status: CallStatus) -> Result<bool, BellError> {
        self.check_updates()?;
        Ok(match self.records.lock().await.get_mut(&call_id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        })
    }

    async fn set_duration(&self, call_id: Uuid, duration_seconds: i32) -> Result<bool, BellError> {
        self.check_updates()?;
        Ok(match self.records.lock().await.get_mut(&call_id) {
            Some(record) => {
                record.duration_seconds = duration_seconds;
                true
            }
            None => false,
        })
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<CallRecord>, BellError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let records = self.records.lock().await;

        let mut owned: Vec<CallRecord> = records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        owned.truncate(limit);

        Ok(owned)
    }

    async fn stats_for_owner(&self, owner_id: &str) -> Result<CallStats, BellError> {
        let records = self.records.lock().await;

        Ok(records
            .values()
            .filter(|r| r.owner_id == owner_id)
            .fold(CallStats::default(), |mut stats, record| {
                stats.total += 1;
                match record.status {
                    CallStatus::Answered => stats.answered += 1,
                    CallStatus::Missed => stats.missed += 1,
                    CallStatus::Blocked => stats.blocked += 1,
                }
                stats
            }))
    }

    async fn delete_for_owner(&self, call_id: Uuid, owner_id: &str) -> Result<bool, BellError> {
        let mut records = self.records.lock().await;

        match records.get(&call_id) {
            Some(record) if record.owner_id == owner_id => {
                records.remove(&call_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Ring admission over separate settings, call and message stores.
///
/// Rings are admitted one at a time. The stores share no transaction, so a
/// failed append removes the call record it just created.
pub struct InMemoryRingStore {
    settings: Arc<dyn SettingsProvider>,
    calls: Arc<dyn CallStore>,
    messages: Arc<dyn MessageStore>,
    admission: Mutex<()>,
}

impl InMemoryRingStore {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        calls: Arc<dyn CallStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            settings,
            calls,
            messages,
            admission: Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl RingStore for InMemoryRingStore {
    async fn open_ring(
        &self,
        call: NewCallRecord,
        ring: NewSignalingMessage,
        admit: &(dyn for<'p> Fn(&'p AccessPolicy) -> Result<(), BellError> + Send + Sync),
    ) -> Result<OpenedRing, BellError> {
        let _admission = self.admission.lock().await;

        let policy = self
            .settings
            .doorbell_for(&call.owner_id)
            .await?
            .map(|profile| profile.policy)
            .unwrap_or_default();
        admit(&policy)?;

        let call = self.calls.create(call).await?;
        match self.messages.append(ring).await {
            Ok(message) => Ok(OpenedRing { call, message }),
            Err(e) => {
                if let Err(undo) = self.calls.delete_for_owner(call.id, &call.owner_id).await {
                    tracing::warn!(
                        target: "bell.store",
                        call_id = %call.id,
                        error = %undo,
                        "Failed to remove call record after ring append failed"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Fixed doorbell profiles keyed by owner id.
#[derive(Default)]
pub struct StaticSettings {
    profiles: HashMap<String, DoorbellProfile>,
}

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: DoorbellProfile) -> Self {
        self.profiles.insert(profile.owner_id.clone(), profile);
        self
    }
}

#[async_trait::async_trait]
impl SettingsProvider for StaticSettings {
    async fn doorbell_for(&self, owner_id: &str) -> Result<Option<DoorbellProfile>, BellError> {
        Ok(self.profiles.get(owner_id).cloned())
    }
}

/// Fixed sessions keyed by token.
#[derive(Default)]
pub struct StaticSessions {
    sessions: HashMap<String, OwnerSession>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, token: &str, session: OwnerSession) -> Self {
        self.sessions.insert(token.to_string(), session);
        self
    }
}

#[async_trait::async_trait]
impl SessionResolver for StaticSessions {
    async fn current_user(&self, session_token: &str) -> Result<Option<OwnerSession>, BellError> {
        Ok(self.sessions.get(session_token).cloned())
    }
}

/// Fixed device tokens keyed by owner id.
#[derive(Default)]
pub struct StaticSubscriptions {
    tokens: HashMap<String, Vec<String>>,
}

impl StaticSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(mut self, owner_id: &str, tokens: &[&str]) -> Self {
        self.tokens.insert(
            owner_id.to_string(),
            tokens.iter().map(|t| t.to_string()).collect(),
        );
        self
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for StaticSubscriptions {
    async fn tokens_for(&self, owner_id: &str) -> Result<Vec<String>, BellError> {
        Ok(self.tokens.get(owner_id).cloned().unwrap_or_default())
    }
}
