//! Observability module for the relay service.
//!
//! Provides metrics definitions and instrumentation helpers.

pub mod metrics;
