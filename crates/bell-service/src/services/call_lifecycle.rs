//! Call lifecycle coordinator.
//!
//! ```text
//!  (none) --ring admitted--> MISSED --accept(owner, call_id)--> ANSWERED
//!  MISSED | ANSWERED --end(call_id)--> duration recorded, status unchanged
//! ```
//!
//! A call that is never accepted stays `missed`. Transitions that name an
//! unknown call are no-ops.

use crate::errors::BellError;
use crate::models::{AccessPolicy, CallStatus, NewCallRecord, NewSignalingMessage};
use crate::observability::metrics;
use crate::store::{CallStore, OpenedRing, RingStore};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Creates call records and applies status and duration transitions.
#[derive(Clone)]
pub struct CallLifecycle {
    calls: Arc<dyn CallStore>,
    rings: Arc<dyn RingStore>,
}

impl CallLifecycle {
    pub fn new(calls: Arc<dyn CallStore>, rings: Arc<dyn RingStore>) -> Self {
        Self { calls, rings }
    }

    /// Open a `missed` call for a visitor ring and store the ring with it.
    ///
    /// `admit` decides from the owner's current policy. The gate decision,
    /// the call record and the ring message are one unit: a refusal or a
    /// failed write leaves nothing stored.
    #[instrument(skip_all, name = "bell.calls.start", fields(owner_id = %call.owner_id, call_id = %call.id))]
    pub async fn start_call(
        &self,
        call: NewCallRecord,
        ring: NewSignalingMessage,
        admit: &(dyn Fn(&AccessPolicy) -> Result<(), BellError> + Send + Sync),
    ) -> Result<OpenedRing, BellError> {
        let opened = self.rings.open_ring(call, ring, admit).await?;

        metrics::record_call_started();
        tracing::info!(target: "bell.calls", "Call started");

        Ok(opened)
    }

    /// Mark a call answered. Returns false if no such call exists.
    ///
    /// Idempotent; a malformed id is treated as unknown.
    #[instrument(skip_all, name = "bell.calls.answer", fields(call_id = %call_id))]
    pub async fn mark_answered(&self, call_id: &str) -> Result<bool, BellError> {
        let Ok(id) = Uuid::parse_str(call_id) else {
            metrics::record_call_transition("answered", "unknown_call");
            return Ok(false);
        };

        let applied = self.calls.set_status(id, CallStatus::Answered).await?;
        metrics::record_call_transition("answered", outcome(applied));

        if !applied {
            tracing::debug!(target: "bell.calls", "Accept referenced unknown call");
        }

        Ok(applied)
    }

    /// Record the duration of a call (last write wins). Returns false if no
    /// such call exists.
    ///
    /// # Errors
    ///
    /// `BellError::BadRequest` when the duration is negative or too large.
    #[instrument(skip_all, name = "bell.calls.end", fields(call_id = %call_id))]
    pub async fn record_end(&self, call_id: &str, duration_seconds: i64) -> Result<bool, BellError> {
        let duration = validate_duration(duration_seconds)?;

        let Ok(id) = Uuid::parse_str(call_id) else {
            metrics::record_call_transition("ended", "unknown_call");
            return Ok(false);
        };

        let applied = self.calls.set_duration(id, duration).await?;
        metrics::record_call_transition("ended", outcome(applied));

        Ok(applied)
    }
}

/// Check a client-supplied duration fits the stored column.
pub fn validate_duration(duration_seconds: i64) -> Result<i32, BellError> {
    if duration_seconds < 0 {
        return Err(BellError::BadRequest(
            "duration_seconds must not be negative".to_string(),
        ));
    }

    i32::try_from(duration_seconds)
        .map_err(|_| BellError::BadRequest("duration_seconds is too large".to_string()))
}

fn outcome(applied: bool) -> &'static str {
    if applied {
        "applied"
    } else {
        "unknown_call"
    }
}
