//! Middleware for the relay service.
//!
//! # Components
//!
//! - `auth` - Owner session resolution for call history routes
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_session, AuthState};
pub use http_metrics::http_metrics_middleware;
