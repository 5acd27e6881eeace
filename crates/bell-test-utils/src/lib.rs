//! # Bell Test Utilities
//!
//! Shared test utilities for the ScanBell relay service.
//!
//! This crate provides:
//! - Server test harness (`TestBellServer` for E2E tests)
//! - Database fixtures for the collaborator-owned tables (owners, sessions,
//!   doorbell settings, push subscriptions)
//! - Fixed test IDs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bell_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     seed_owner(&pool, TEST_OWNER_SAM, "Sam").await?;
//!     let server = TestBellServer::spawn(pool).await?;
//!
//!     let response = reqwest::get(format!("{}/health", server.url())).await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;
pub mod test_ids;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
