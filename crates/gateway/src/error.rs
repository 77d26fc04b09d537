//! Unified error handling, mapped onto the stable error-code taxonomy in
//! spec.md §6/§7.
//!
//! Propagation policy (spec §7): input validation fails before any external
//! call; cache and relational-store lookups degrade gracefully on failure
//! and never surface as a client-visible error; engine errors and the
//! global deadline become `ServiceUnavailable` / `GatewayTimeout`; anything
//! else is `Internal` and is reported to Sentry but never shown to the
//! client.

use std::error::Error as _;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::request::CorrelationId;

/// Gateway error taxonomy. Variants map 1:1 onto the error codes in
/// spec.md §6.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out")]
    RequestTimeout,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("search engine unavailable")]
    ServiceUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("gateway timeout")]
    GatewayTimeout,

    #[error("internal error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    /// The stable, client-facing error code (spec.md §6).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::Conflict(_) => "CONFLICT",
            Self::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message shown to the client. `ServiceUnavailable` and `Internal`
    /// never leak their source; the real cause is only ever logged.
    fn client_message(&self) -> String {
        match self {
            Self::ServiceUnavailable(_) => {
                "the search engine is temporarily unavailable".to_string()
            }
            Self::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Error envelope shape from spec.md §6.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    meta: ErrorMeta,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorMeta {
    timestamp: chrono::DateTime<chrono::Utc>,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

/// Renders an [`AppError`] into the full `ErrorResponse` envelope, given the
/// request path and correlation id that the route handler already has on
/// hand. Handlers call this instead of relying on the blanket
/// `IntoResponse` impl so the path and correlation id are always populated.
pub fn render(err: &AppError, path: &str, correlation_id: Option<&CorrelationId>) -> Response {
    if matches!(err, AppError::Internal(_) | AppError::ServiceUnavailable(_)) {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            source = ?err.source(),
            sentry_event_id = %event_id,
            correlation_id = correlation_id.map(CorrelationId::as_str),
            path,
            "request failed"
        );
    }

    let body = ErrorBody {
        error: ErrorDetail {
            code: err.code(),
            message: err.client_message(),
        },
        meta: ErrorMeta {
            timestamp: chrono::Utc::now(),
            path: path.to_string(),
            correlation_id: correlation_id.map(|c| c.as_str().to_string()),
        },
    };

    (err.status(), Json(body)).into_response()
}

/// Fallback `IntoResponse` for contexts without a path/correlation id on
/// hand (e.g. middleware rejections before a handler runs).
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        render(&self, "", None)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::ServiceUnavailable(Box::new(err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}
