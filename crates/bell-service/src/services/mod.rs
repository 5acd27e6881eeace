//! Service layer for the relay.
//!
//! # Components
//!
//! - `access_gate` - Block list and availability window checks
//! - `call_history` - Owner-scoped call history reads and deletes
//! - `call_lifecycle` - Call record creation and status/duration transitions
//! - `notifier` - Ring push notifications (OneSignal)
//! - `signaling_relay` - Send and poll over the signaling log

pub mod access_gate;
pub mod call_history;
pub mod call_lifecycle;
pub mod notifier;
pub mod signaling_relay;

pub use access_gate::{check_access, AccessDecision, AccessGate};
pub use call_history::CallHistory;
pub use call_lifecycle::CallLifecycle;
pub use notifier::{notifier_from_config, Notifier, RingNotification};
pub use signaling_relay::{RelayOptions, SignalingRelay};
