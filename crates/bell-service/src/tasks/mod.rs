//! Background tasks for the relay service.
//!
//! # Tasks
//!
//! - `notification_worker` - Delivers ring notifications off the request path

pub mod notification_worker;

pub use notification_worker::{
    start_notification_worker, NotificationDispatcher, NotificationWorkerConfig,
};
