//! PostgreSQL-backed store adapters.

use super::{
    CallStore, MessageStore, OpenedRing, RingStore, SessionResolver, SettingsProvider,
    SubscriptionStore,
};
use crate::errors::BellError;
use crate::models::{
    AccessPolicy, CallRecord, CallStats, CallStatus, DoorbellProfile, NewCallRecord,
    NewSignalingMessage, OwnerSession, SenderRole, SignalingMessage,
};
use crate::repositories::{
    CallRecordsRepository, DoorbellSettingsRepository, PushSubscriptionsRepository,
    RingsRepository, SessionsRepository, SignalingMessagesRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Signaling log in `signaling_messages`.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: NewSignalingMessage) -> Result<SignalingMessage, BellError> {
        SignalingMessagesRepository::append(&self.pool, &message).await
    }

    async fn claim_undelivered(
        &self,
        room_id: &str,
        sender: SenderRole,
        limit: i64,
    ) -> Result<Vec<SignalingMessage>, BellError> {
        SignalingMessagesRepository::claim_undelivered(&self.pool, room_id, sender, limit).await
    }
}

/// Call records in `call_records`.
#[derive(Clone)]
pub struct PgCallStore {
    pool: PgPool,
}

impl PgCallStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CallStore for PgCallStore {
    async fn create(&self, record: NewCallRecord) -> Result<CallRecord, BellError> {
        CallRecordsRepository::create(&self.pool, &record).await
    }

    async fn set_status(&self, call_id: Uuid, status: CallStatus) -> Result<bool, BellError> {
        CallRecordsRepository::set_status(&self.pool, call_id, status).await
    }

    async fn set_duration(&self, call_id: Uuid, duration_seconds: i32) -> Result<bool, BellError> {
        CallRecordsRepository::set_duration(&self.pool, call_id, duration_seconds).await
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<CallRecord>, BellError> {
        CallRecordsRepository::list_for_owner(&self.pool, owner_id, limit).await
    }

    async fn stats_for_owner(&self, owner_id: &str) -> Result<CallStats, BellError> {
        CallRecordsRepository::stats_for_owner(&self.pool, owner_id).await
    }

    async fn delete_for_owner(&self, call_id: Uuid, owner_id: &str) -> Result<bool, BellError> {
        CallRecordsRepository::delete_for_owner(&self.pool, call_id, owner_id).await
    }
}

/// Ring admission in one transaction over `doorbell_settings`,
/// `call_records` and `signaling_messages`.
#[derive(Clone)]
pub struct PgRingStore {
    pool: PgPool,
}

impl PgRingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RingStore for PgRingStore {
    async fn open_ring(
        &self,
        call: NewCallRecord,
        ring: NewSignalingMessage,
        admit: &(dyn for<'p> Fn(&'p AccessPolicy) -> Result<(), BellError> + Send + Sync),
    ) -> Result<OpenedRing, BellError> {
        let (call, message) = RingsRepository::open(&self.pool, &call, &ring, admit).await?;
        Ok(OpenedRing { call, message })
    }
}

/// Doorbell settings from `doorbell_settings` and `users`.
#[derive(Clone)]
pub struct PgSettings {
    pool: PgPool,
}

impl PgSettings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SettingsProvider for PgSettings {
    async fn doorbell_for(&self, owner_id: &str) -> Result<Option<DoorbellProfile>, BellError> {
        DoorbellSettingsRepository::find_profile(&self.pool, owner_id).await
    }
}

/// Sessions from `user_sessions`.
#[derive(Clone)]
pub struct PgSessions {
    pool: PgPool,
}

impl PgSessions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionResolver for PgSessions {
    async fn current_user(&self, session_token: &str) -> Result<Option<OwnerSession>, BellError> {
        SessionsRepository::find_active(&self.pool, session_token).await
    }
}

/// Device tokens from `push_subscriptions`.
#[derive(Clone)]
pub struct PgSubscriptions {
    pool: PgPool,
}

impl PgSubscriptions {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubscriptionStore for PgSubscriptions {
    async fn tokens_for(&self, owner_id: &str) -> Result<Vec<String>, BellError> {
        PushSubscriptionsRepository::tokens_for_owner(&self.pool, owner_id).await
    }
}
