//! Owner session middleware for protected routes.
//!
//! Resolves the `session_token` cookie, or a Bearer token when no cookie is
//! present, and injects the [`OwnerSession`] into request extensions.

use crate::errors::BellError;
use crate::models::OwnerSession;
use crate::store::SessionResolver;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Cookie carrying the owner's session token.
pub const SESSION_COOKIE: &str = "session_token";

/// State for the session middleware.
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn SessionResolver>,
}

/// Require an unexpired owner session.
///
/// # Response
///
/// - 401 Unauthorized if no token is present or it does not resolve
/// - Otherwise continues with `OwnerSession` in extensions
#[instrument(skip_all, name = "bell.middleware.auth")]
pub async fn require_session(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, BellError> {
    let token = session_token(req.headers()).ok_or_else(|| {
        tracing::debug!(target: "bell.middleware.auth", "Missing session token");
        BellError::Unauthorized("Not authenticated".to_string())
    })?;

    let session = state.sessions.current_user(&token).await?.ok_or_else(|| {
        tracing::debug!(target: "bell.middleware.auth", "Unknown or expired session");
        BellError::Unauthorized("Not authenticated".to_string())
    })?;

    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}

/// Extract the session token, preferring the cookie over the header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}
