//! Test server harness for E2E testing
//!
//! Provides `TestBellServer` for spawning real relay instances in tests.

use bell_service::config::Config;
use bell_service::routes::{self, AppState};
use bell_service::services::notifier::mock::RecordingNotifier;
use bell_service::tasks::{
    start_notification_worker, NotificationDispatcher, NotificationWorkerConfig,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::PgPool;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Test harness for spawning the relay in E2E tests.
///
/// Ring notifications go to a [`RecordingNotifier`] instead of a push
/// provider.
///
/// # Example
/// ```rust,ignore
/// #[sqlx::test(migrations = "../../migrations")]
/// async fn test_health_flow_e2e(pool: PgPool) -> Result<()> {
///     let server = TestBellServer::spawn(pool).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestBellServer {
    addr: SocketAddr,
    pool: PgPool,
    config: Config,
    notifier: Arc<RecordingNotifier>,
    worker_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestBellServer {
    /// Spawn a server with the default test configuration.
    pub async fn spawn(pool: PgPool) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(pool, HashMap::new()).await
    }

    /// Spawn a server, overriding configuration variables with `overrides`.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server and notification worker in the background
    pub async fn spawn_with_vars(
        pool: PgPool,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, receiver) =
            NotificationDispatcher::channel(config.notifications.queue_capacity);
        let worker_token = CancellationToken::new();
        tokio::spawn(start_notification_worker(
            receiver,
            notifier.clone(),
            NotificationWorkerConfig {
                timeout: Duration::from_secs(2),
                concurrency: 2,
            },
            worker_token.clone(),
        ));

        let state = Arc::new(AppState::new(pool.clone(), config.clone(), dispatcher));

        // A recorder per server; only one can be installed globally per process
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            pool,
            config,
            notifier,
            worker_token,
            _handle: handle,
        })
    }

    /// Get reference to the database pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Notifications the server has delivered so far.
    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }

    /// Wait until `count` notifications were delivered, or `timeout` passes.
    pub async fn wait_for_notifications(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.notifier.sent().await.len() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestBellServer {
    fn drop(&mut self) {
        self.worker_token.cancel();
        self._handle.abort();
    }
}
