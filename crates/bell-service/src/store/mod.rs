//! Storage seams for the relay.
//!
//! Services depend on these traits rather than on a database handle. The
//! `postgres` adapters delegate to the repositories; the `memory`
//! implementations back unit tests and keep the same claim semantics.
//!
//! # Delivery claims
//!
//! [`MessageStore::claim_undelivered`] must flip each returned message from
//! undelivered to delivered atomically, so two concurrent claims for the same
//! room and sender never both return a message.
//!
//! # Ring admission
//!
//! [`RingStore::open_ring`] reads the owner's policy, asks the caller to
//! admit the ring, then creates the call record and appends the ring message.
//! Either all of it is stored or none of it is.

pub mod memory;
pub mod postgres;

use crate::errors::BellError;
use crate::models::{
    AccessPolicy, CallRecord, CallStats, CallStatus, DoorbellProfile, NewCallRecord,
    NewSignalingMessage, OwnerSession, SenderRole, SignalingMessage,
};
use uuid::Uuid;

pub use memory::{
    InMemoryCallStore, InMemoryMessageStore, InMemoryRingStore, StaticSessions, StaticSettings,
    StaticSubscriptions,
};
pub use postgres::{
    PgCallStore, PgMessageStore, PgRingStore, PgSessions, PgSettings, PgSubscriptions,
};

/// Append-only signaling message log.
#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message with `delivered = false`.
    async fn append(&self, message: NewSignalingMessage) -> Result<SignalingMessage, BellError>;

    /// Atomically claim up to `limit` undelivered messages from `sender` in
    /// `room_id`, oldest first.
    async fn claim_undelivered(
        &self,
        room_id: &str,
        sender: SenderRole,
        limit: i64,
    ) -> Result<Vec<SignalingMessage>, BellError>;
}

/// Call record persistence.
#[async_trait::async_trait]
pub trait CallStore: Send + Sync {
    async fn create(&self, record: NewCallRecord) -> Result<CallRecord, BellError>;

    /// Returns false when the call does not exist.
    async fn set_status(&self, call_id: Uuid, status: CallStatus) -> Result<bool, BellError>;

    /// Returns false when the call does not exist.
    async fn set_duration(&self, call_id: Uuid, duration_seconds: i32) -> Result<bool, BellError>;

    /// Newest first, at most `limit` records.
    async fn list_for_owner(&self, owner_id: &str, limit: i64)
        -> Result<Vec<CallRecord>, BellError>;

    async fn stats_for_owner(&self, owner_id: &str) -> Result<CallStats, BellError>;

    /// Returns false when no record with this id belongs to `owner_id`.
    async fn delete_for_owner(&self, call_id: Uuid, owner_id: &str) -> Result<bool, BellError>;
}

/// A ring stored together with the call it opened.
#[derive(Debug, Clone)]
pub struct OpenedRing {
    pub call: CallRecord,
    pub message: SignalingMessage,
}

/// Atomic ring admission.
#[async_trait::async_trait]
pub trait RingStore: Send + Sync {
    /// Load the policy of `call.owner_id` and pass it to `admit`. When it
    /// returns `Ok`, create `call` and append `ring`.
    ///
    /// A refusal from `admit` is returned unchanged and nothing is stored.
    /// If a write fails, nothing from this ring is left behind.
    async fn open_ring(
        &self,
        call: NewCallRecord,
        ring: NewSignalingMessage,
        admit: &(dyn for<'p> Fn(&'p AccessPolicy) -> Result<(), BellError> + Send + Sync),
    ) -> Result<OpenedRing, BellError>;
}

/// Read access to doorbell settings owned by the settings service.
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    /// `None` when the owner has not set up a doorbell.
    async fn doorbell_for(&self, owner_id: &str) -> Result<Option<DoorbellProfile>, BellError>;
}

/// Resolves session tokens issued by the account service.
#[async_trait::async_trait]
pub trait SessionResolver: Send + Sync {
    async fn current_user(&self, session_token: &str) -> Result<Option<OwnerSession>, BellError>;
}

/// Push device tokens registered by owners.
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn tokens_for(&self, owner_id: &str) -> Result<Vec<String>, BellError>;
}
