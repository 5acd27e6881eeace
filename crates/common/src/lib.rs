//! Common utilities and types shared across ScanBell components.

#![warn(clippy::pedantic)]

/// Module for room identifiers and call link suffixes
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
