//! Ring notification worker.
//!
//! Rings are announced off the request path. [`NotificationDispatcher`] puts
//! jobs on a bounded queue without waiting; when the queue is full the job is
//! dropped with a warning. The worker drains the queue, runs each delivery
//! under a timeout and bounds how many run at once.
//!
//! # Graceful Shutdown
//!
//! When the cancellation token fires the worker stops taking jobs, lets
//! in-flight deliveries finish (each is bounded by its timeout) and exits.

use crate::observability::metrics;
use crate::services::notifier::{Notifier, RingNotification};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Non-blocking handle for queueing ring notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<RingNotification>,
}

impl NotificationDispatcher {
    /// Create a dispatcher and the receiver its worker drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RingNotification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a notification. Returns false if it was dropped.
    pub fn dispatch(&self, ring: RingNotification) -> bool {
        match self.sender.try_send(ring) {
            Ok(()) => true,
            Err(TrySendError::Full(ring)) => {
                warn!(
                    target: "bell.task.notifications",
                    call_id = %ring.call_id,
                    "Notification queue full, dropping ring notification"
                );
                metrics::record_notification("dropped", None);
                false
            }
            Err(TrySendError::Closed(ring)) => {
                warn!(
                    target: "bell.task.notifications",
                    call_id = %ring.call_id,
                    "Notification worker stopped, dropping ring notification"
                );
                metrics::record_notification("dropped", None);
                false
            }
        }
    }
}

/// Worker limits.
#[derive(Debug, Clone, Copy)]
pub struct NotificationWorkerConfig {
    /// Timeout for one delivery.
    pub timeout: Duration,
    /// Deliveries in flight at once.
    pub concurrency: usize,
}

/// Run the notification worker until cancelled or the queue closes.
#[instrument(skip_all, name = "bell.task.notifications")]
pub async fn start_notification_worker(
    mut receiver: mpsc::Receiver<RingNotification>,
    notifier: Arc<dyn Notifier>,
    config: NotificationWorkerConfig,
    cancel_token: CancellationToken,
) {
    info!(
        target: "bell.task.notifications",
        timeout_ms = config.timeout.as_millis() as u64,
        concurrency = config.concurrency,
        "Starting notification worker"
    );

    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv() => {
                let Some(ring) = job else {
                    info!(target: "bell.task.notifications", "Notification queue closed");
                    break;
                };

                let permit = tokio::select! {
                    permit = Arc::clone(&permits).acquire_owned() => permit,
                    _ = cancel_token.cancelled() => break,
                };
                let Ok(permit) = permit else {
                    break;
                };

                let notifier = Arc::clone(&notifier);
                let timeout = config.timeout;
                in_flight.spawn(async move {
                    let _permit = permit;
                    deliver(notifier.as_ref(), &ring, timeout).await;
                });
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            _ = cancel_token.cancelled() => {
                info!(
                    target: "bell.task.notifications",
                    "Notification worker received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    while in_flight.join_next().await.is_some() {}

    info!(target: "bell.task.notifications", "Notification worker stopped");
}

/// Deliver one notification. Every failure is logged and counted.
async fn deliver(notifier: &dyn Notifier, ring: &RingNotification, timeout: Duration) {
    let start = Instant::now();

    match tokio::time::timeout(timeout, notifier.notify(ring)).await {
        Ok(Ok(())) => {
            metrics::record_notification("delivered", Some(start.elapsed()));
        }
        Ok(Err(e)) => {
            warn!(
                target: "bell.task.notifications",
                call_id = %ring.call_id,
                error = %e,
                "Ring notification failed"
            );
            metrics::record_notification("failed", Some(start.elapsed()));
        }
        Err(_) => {
            warn!(
                target: "bell.task.notifications",
                call_id = %ring.call_id,
                timeout_ms = timeout.as_millis() as u64,
                "Ring notification timed out"
            );
            metrics::record_notification("timeout", Some(start.elapsed()));
        }
    }
}
