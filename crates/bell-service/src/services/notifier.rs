//! Doorbell push notifications.
//!
//! A ring is announced to the owner's devices through OneSignal. Delivery is
//! best-effort: the relay hands jobs to the notification worker and never
//! sees the outcome.

use crate::config::NotificationConfig;
use crate::errors::BellError;
use crate::store::SubscriptionStore;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Notification title.
pub const RING_TITLE: &str = "Someone is at your door";

/// `data.type` carried by ring notifications.
pub const RING_NOTIFICATION_TYPE: &str = "doorbell_ring";

/// Connect timeout for the push provider.
const ONESIGNAL_CONNECT_TIMEOUT_SECS: u64 = 5;

/// One ring to announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingNotification {
    pub owner_id: String,
    pub visitor_name: String,
    pub call_id: Uuid,
}

impl RingNotification {
    pub fn body(&self) -> String {
        format!("{} is ringing your ScanBell", self.visitor_name)
    }
}

/// Push notification sender.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ring: &RingNotification) -> Result<(), BellError>;
}

/// Notifier used when no push provider is configured.
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, ring: &RingNotification) -> Result<(), BellError> {
        tracing::debug!(
            target: "bell.notify",
            call_id = %ring.call_id,
            "Push provider not configured, skipping notification"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OneSignalRequest<'a> {
    app_id: &'a str,
    include_subscription_ids: &'a [String],
    headings: HashMap<&'static str, &'a str>,
    contents: HashMap<&'static str, String>,
    data: OneSignalData<'a>,
    buttons: [OneSignalButton; 1],
}

#[derive(Debug, Serialize)]
struct OneSignalData<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    call_id: String,
    visitor_name: &'a str,
}

#[derive(Debug, Serialize)]
struct OneSignalButton {
    id: &'static str,
    text: &'static str,
}

/// OneSignal REST notifier.
///
/// Addresses every subscription the owner has registered; an owner without
/// subscriptions is skipped.
#[derive(Clone)]
pub struct OneSignalNotifier {
    client: Client,
    app_id: String,
    api_key: SecretString,
    api_url: String,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl OneSignalNotifier {
    /// Create a notifier.
    ///
    /// # Errors
    ///
    /// Returns `BellError::Internal` if the HTTP client cannot be built.
    pub fn new(
        app_id: String,
        api_key: SecretString,
        api_url: String,
        timeout: Duration,
        subscriptions: Arc<dyn SubscriptionStore>,
    ) -> Result<Self, BellError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(ONESIGNAL_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                error!(target: "bell.notify", error = %e, "Failed to build HTTP client");
                BellError::Internal
            })?;

        Ok(Self {
            client,
            app_id,
            api_key,
            api_url,
            subscriptions,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for OneSignalNotifier {
    #[instrument(skip_all, name = "bell.notify.onesignal", fields(call_id = %ring.call_id))]
    async fn notify(&self, ring: &RingNotification) -> Result<(), BellError> {
        let subscription_ids = self.subscriptions.tokens_for(&ring.owner_id).await?;

        if subscription_ids.is_empty() {
            tracing::info!(target: "bell.notify", "Owner has no push subscriptions, skipping");
            return Ok(());
        }

        let request = OneSignalRequest {
            app_id: &self.app_id,
            include_subscription_ids: &subscription_ids,
            headings: HashMap::from([("en", RING_TITLE)]),
            contents: HashMap::from([("en", ring.body())]),
            data: OneSignalData {
                kind: RING_NOTIFICATION_TYPE,
                call_id: ring.call_id.to_string(),
                visitor_name: &ring.visitor_name,
            },
            buttons: [OneSignalButton {
                id: "view",
                text: "View",
            }],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header(
                "Authorization",
                format!("Basic {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| BellError::Upstream(format!("OneSignal request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "bell.notify",
                status = %status,
                "OneSignal rejected notification"
            );
            return Err(BellError::Upstream(format!(
                "OneSignal returned {}: {}",
                status, body
            )));
        }

        tracing::info!(
            target: "bell.notify",
            devices = subscription_ids.len(),
            "Ring notification sent"
        );

        Ok(())
    }
}

/// Build the notifier for `config`, falling back to [`NoopNotifier`] when no
/// API key is set.
pub fn notifier_from_config(
    config: &NotificationConfig,
    subscriptions: Arc<dyn SubscriptionStore>,
) -> Result<Arc<dyn Notifier>, BellError> {
    match &config.onesignal_api_key {
        Some(api_key) => Ok(Arc::new(OneSignalNotifier::new(
            config.onesignal_app_id.clone(),
            api_key.clone(),
            config.onesignal_api_url.clone(),
            config.timeout,
            subscriptions,
        )?)),
        None => {
            warn!(
                target: "bell.notify",
                "ONESIGNAL_API_KEY not set; ring notifications are disabled"
            );
            Ok(Arc::new(NoopNotifier))
        }
    }
}

/// Test doubles for [`Notifier`].
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Records every notification it is asked to send.
    pub struct RecordingNotifier {
        sent: Mutex<Vec<RingNotification>>,
        call_count: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                delay: None,
                fail: false,
            }
        }

        /// A notifier that always fails.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        /// A notifier that waits `delay` before completing.
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new()
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Notifications that completed successfully.
        pub async fn sent(&self) -> Vec<RingNotification> {
            self.sent.lock().await.clone()
        }
    }

    impl Default for RecordingNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, ring: &RingNotification) -> Result<(), BellError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.fail {
                return Err(BellError::Upstream("mock notifier failure".to_string()));
            }

            self.sent.lock().await.push(ring.clone());
            Ok(())
        }
    }
}
