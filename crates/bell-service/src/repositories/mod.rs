//! Repository layer for the relay service.
//!
//! PostgreSQL queries following the Handler -> Service -> Repository
//! architecture. Services never call these directly; they go through the
//! `store` traits, whose PostgreSQL adapters delegate here.

pub mod call_records;
pub mod doorbell_settings;
pub mod push_subscriptions;
pub mod rings;
pub mod sessions;
pub mod signaling_messages;

pub use call_records::CallRecordsRepository;
pub use doorbell_settings::DoorbellSettingsRepository;
pub use push_subscriptions::PushSubscriptionsRepository;
pub use rings::RingsRepository;
pub use sessions::SessionsRepository;
pub use signaling_messages::SignalingMessagesRepository;
