//! HTTP routes for the relay service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_session, AuthState};
use crate::services::{AccessGate, CallHistory, CallLifecycle, RelayOptions, SignalingRelay};
use crate::store::{
    PgCallStore, PgMessageStore, PgRingStore, PgSessions, PgSettings, SessionResolver,
};
use crate::tasks::NotificationDispatcher;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (readiness checks).
    pub pool: PgPool,

    /// Service configuration.
    pub config: Config,

    /// Send/poll relay.
    pub relay: SignalingRelay,

    /// Access gate for room info.
    pub gate: AccessGate,

    /// Call transitions for the end-call endpoint.
    pub lifecycle: CallLifecycle,

    /// Owner call history.
    pub history: CallHistory,

    /// Owner session lookups.
    pub sessions: Arc<dyn SessionResolver>,
}

impl AppState {
    /// Wire services over the PostgreSQL stores.
    pub fn new(pool: PgPool, config: Config, notifications: NotificationDispatcher) -> Self {
        let calls = Arc::new(PgCallStore::new(pool.clone()));
        let gate = AccessGate::new(
            Arc::new(PgSettings::new(pool.clone())),
            config.availability_offset,
        );
        let lifecycle = CallLifecycle::new(
            calls.clone(),
            Arc::new(PgRingStore::new(pool.clone())),
        );
        let relay = SignalingRelay::new(
            Arc::new(PgMessageStore::new(pool.clone())),
            gate.clone(),
            lifecycle.clone(),
            notifications,
            RelayOptions {
                page_size: config.poll_page_size,
                enforce_availability_on_ring: config.enforce_availability_on_ring,
            },
        );
        let history = CallHistory::new(calls, config.call_history_limit);

        Self {
            sessions: Arc::new(PgSessions::new(pool.clone())),
            pool,
            config,
            relay,
            gate,
            lifecycle,
            history,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (database ping)
/// - `/metrics` - Prometheus metrics endpoint
/// - `/api/signaling/*` and `/api/call/info/:room_id` - public relay endpoints
/// - `/api/calls/*` - call history, requires an owner session
/// - CORS, TraceLayer, 30 second request timeout and HTTP metrics
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        sessions: state.sessions.clone(),
    });
    let cors = cors_layer(&state.config.cors_origins);

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/signaling/send", post(handlers::send_signal))
        .route("/api/signaling/poll/:room_id", get(handlers::poll_signals))
        .route("/api/signaling/end-call", post(handlers::end_call))
        .route("/api/call/info/:room_id", get(handlers::room_info))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Owner routes (session required)
    let protected_routes = Router::new()
        .route("/api/calls/history", get(handlers::list_calls))
        .route("/api/calls/stats", get(handlers::call_stats))
        .route("/api/calls/:call_id", delete(handlers::delete_call))
        .route_layer(middleware::from_fn_with_state(auth_state, require_session))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. CorsLayer - Answer preflights, decorate responses
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS for the configured origins; `*` allows any origin without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any).allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(target: "bell.routes", origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_cors_layer_builds_for_wildcard_and_list() {
        let _any = cors_layer(&["*".to_string()]);
        let _listed = cors_layer(&[
            "https://scanbell.app".to_string(),
            "not a valid\nheader".to_string(),
        ]);
    }
}
