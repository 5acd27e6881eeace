//! Call history queries for the authenticated owner.

use crate::errors::BellError;
use crate::models::{CallRecord, CallStats};
use crate::store::CallStore;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Owner-scoped reads and deletes over call records.
#[derive(Clone)]
pub struct CallHistory {
    calls: Arc<dyn CallStore>,
    limit: i64,
}

impl CallHistory {
    /// `limit` caps the number of records [`CallHistory::list`] returns.
    pub fn new(calls: Arc<dyn CallStore>, limit: i64) -> Self {
        Self { calls, limit }
    }

    /// Newest first.
    #[instrument(skip_all, name = "bell.history.list", fields(owner_id = %owner_id))]
    pub async fn list(&self, owner_id: &str) -> Result<Vec<CallRecord>, BellError> {
        self.calls.list_for_owner(owner_id, self.limit).await
    }

    #[instrument(skip_all, name = "bell.history.stats", fields(owner_id = %owner_id))]
    pub async fn stats(&self, owner_id: &str) -> Result<CallStats, BellError> {
        self.calls.stats_for_owner(owner_id).await
    }

    /// Delete one of the owner's call records.
    ///
    /// # Errors
    ///
    /// `BellError::NotFound` if the record does not exist or belongs to
    /// another owner.
    #[instrument(skip_all, name = "bell.history.delete", fields(owner_id = %owner_id, call_id = %call_id))]
    pub async fn delete(&self, call_id: &str, owner_id: &str) -> Result<(), BellError> {
        let not_found = || BellError::NotFound("Call not found".to_string());

        let id = Uuid::parse_str(call_id).map_err(|_| not_found())?;

        if self.calls.delete_for_owner(id, owner_id).await? {
            tracing::info!(target: "bell.history", "Call record deleted");
            Ok(())
        } else {
            Err(not_found())
        }
    }
}
