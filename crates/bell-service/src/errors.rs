//! Relay service error types.
//!
//! All errors map to appropriate HTTP status codes via the `IntoResponse` impl.
//! Messages for server-side failures are generic; the underlying error is
//! logged instead of returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Relay service error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 (missing or malformed field)
/// - Unauthorized: 401 (no valid owner session)
/// - Forbidden: 403 (blocked visitor)
/// - NotFound: 404 (unknown doorbell or call history item)
/// - Database, Internal: 500
/// - Upstream: 502 (push provider failure; logged by the relay, never surfaced)
/// - ServiceUnavailable: 503
#[derive(Debug, Error)]
pub enum BellError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl BellError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            BellError::Database(_) | BellError::Internal => 500,
            BellError::BadRequest(_) => 400,
            BellError::Unauthorized(_) => 401,
            BellError::Forbidden(_) => 403,
            BellError::NotFound(_) => 404,
            BellError::Upstream(_) => 502,
            BellError::ServiceUnavailable(_) => 503,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BellError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            BellError::Database(err) => {
                tracing::error!(target: "bell.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            BellError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            BellError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", reason.clone())
            }
            BellError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            BellError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            BellError::Upstream(err) => {
                tracing::warn!(target: "bell.upstream", error = %err, "Upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "An upstream service failed".to_string(),
                )
            }
            BellError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "bell.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            BellError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}

/// Convert sqlx errors to BellError
impl From<sqlx::Error> for BellError {
    fn from(err: sqlx::Error) -> Self {
        BellError::Database(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BellError::BadRequest("Missing required fields".to_string()).to_string(),
            "Bad request: Missing required fields"
        );
        assert_eq!(
            BellError::Forbidden("You have been blocked".to_string()).to_string(),
            "Forbidden: You have been blocked"
        );
        assert_eq!(BellError::Internal.to_string(), "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BellError::Database("x".to_string()).status_code(), 500);
        assert_eq!(BellError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(BellError::Unauthorized("x".to_string()).status_code(), 401);
        assert_eq!(BellError::Forbidden("x".to_string()).status_code(), 403);
        assert_eq!(BellError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(BellError::Upstream("x".to_string()).status_code(), 502);
        assert_eq!(
            BellError::ServiceUnavailable("x".to_string()).status_code(),
            503
        );
        assert_eq!(BellError::Internal.status_code(), 500);
    }

    #[tokio::test]
    async fn test_into_response_database_error_is_generic() {
        let response = BellError::Database("connection refused to 10.0.0.5".to_string())
            .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "DATABASE_ERROR");
        assert_eq!(
            body_json["error"]["message"],
            "An internal database error occurred"
        );
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let response = BellError::Forbidden("You have been blocked".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "FORBIDDEN");
        assert_eq!(body_json["error"]["message"], "You have been blocked");
    }

    #[tokio::test]
    async fn test_into_response_bad_request() {
        let response =
            BellError::BadRequest("Missing required fields".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "BAD_REQUEST");
        assert_eq!(body_json["error"]["message"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = BellError::NotFound("Call not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "NOT_FOUND");
        assert_eq!(body_json["error"]["message"], "Call not found");
    }

    #[tokio::test]
    async fn test_into_response_unauthorized() {
        let response = BellError::Unauthorized("Not authenticated".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_into_response_upstream_is_generic() {
        let response =
            BellError::Upstream("onesignal returned 500: body".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"]["code"], "UPSTREAM_ERROR");
        assert_eq!(body_json["error"]["message"], "An upstream service failed");
    }
}
