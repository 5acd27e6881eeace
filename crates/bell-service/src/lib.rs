//! ScanBell relay service library.
//!
//! Connects an anonymous visitor at a door to the owner's device through a
//! store-and-poll signaling relay:
//!
//! - Signaling relay (send / poll with at-most-once delivery per message)
//! - Call lifecycle (ring -> missed/answered -> duration on end)
//! - Access gate (block list and availability window)
//! - Call history queries for the authenticated owner
//!
//! # Architecture
//!
//! Handler -> Service -> Store -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> store/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Session authentication and HTTP metrics
//! - `models` - Wire and domain data types
//! - `observability` - Prometheus metrics
//! - `repositories` - PostgreSQL queries
//! - `routes` - Axum router setup
//! - `services` - Relay, call lifecycle, history, access gate, notifications
//! - `store` - Storage traits with PostgreSQL and in-memory implementations
//! - `tasks` - Background notification worker

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod store;
pub mod tasks;
