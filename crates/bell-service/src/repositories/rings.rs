//! Ring admission.
//!
//! A visitor ring reads the owner's access policy, creates the call record
//! and appends the ring message in one transaction. The settings row is held
//! under `FOR SHARE` while the decision is made, so a block-list change that
//! commits first is always seen, and one that commits later waits for the
//! ring to finish.

use crate::errors::BellError;
use crate::models::{AccessPolicy, CallRecord, NewCallRecord, NewSignalingMessage, SignalingMessage};
use crate::repositories::{
    CallRecordsRepository, DoorbellSettingsRepository, SignalingMessagesRepository,
};
use sqlx::PgPool;
use tracing::instrument;

/// Ring admission repository.
pub struct RingsRepository;

impl RingsRepository {
    /// Admit a ring and store its call record and message.
    ///
    /// `admit` is called with the owner's policy (the default policy when the
    /// owner has no settings row). If it returns an error, or either insert
    /// fails, the transaction rolls back and nothing is stored.
    #[instrument(skip_all, name = "bell.repo.open_ring", fields(call_id = %call.id))]
    pub async fn open(
        pool: &PgPool,
        call: &NewCallRecord,
        ring: &NewSignalingMessage,
        admit: &(dyn Fn(&AccessPolicy) -> Result<(), BellError> + Send + Sync),
    ) -> Result<(CallRecord, SignalingMessage), BellError> {
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| BellError::Database(format!("Failed to start transaction: {}", e)))?;

        let policy = DoorbellSettingsRepository::lock_profile(&mut *tx, &call.owner_id)
            .await?
            .map(|profile| profile.policy)
            .unwrap_or_default();

        admit(&policy)?;

        let record = CallRecordsRepository::create(&mut *tx, call).await?;
        let message = SignalingMessagesRepository::append(&mut *tx, ring).await?;

        tx.commit()
            .await
            .map_err(|e| BellError::Database(format!("Failed to commit ring: {}", e)))?;

        Ok((record, message))
    }
}
