//! Error types and HTTP response conversion.
//!
//! One `thiserror`-derived enum covers every failure the router can surface,
//! with a single [`IntoResponse`] impl mapping each variant to its status
//! code and JSON body. Handlers return `crate::error::Result<T>` and use `?`;
//! nothing builds an ad-hoc `(StatusCode, String)` tuple.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using the router's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure mode the router can produce, grouped per the error-handling
/// taxonomy: input, auth, rate-limiting, routing, upstream, internal.
#[derive(Debug, Error)]
pub enum Error {
    // -- Input errors: 4xx, never retried --
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("payload too large: {0} bytes exceeds the {1} byte limit")]
    PayloadTooLarge(usize, usize),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("weak password: {0}")]
    WeakPassword(String),

    // -- Auth errors: 401/403, logged at INFO --
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("forbidden: {0}")]
    Forbidden(String),

    // -- Rate limiting: 429, logged at DEBUG --
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // -- Backpressure: 503, never retried automatically by this layer --
    #[error("queue full: {0}")]
    QueueFull(String),

    // -- Routing failures: 400/403/404, always audited --
    #[error("no handler for {0}")]
    NoHandler(String),

    /// No webhook provider matched the request. Distinct from `NoHandler`
    /// because §4.4 specifies `400 no_handler` for this path, not the 404
    /// the proxy's catch-all fallback uses for the same error code.
    #[error("no webhook handler for {0}")]
    NoWebhookHandler(String),

    #[error("no service registered: {org}/{service}")]
    NoService { org: String, service: String },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("timestamp expired")]
    TimestampExpired,

    // -- Upstream failures: 502/504, emit route.failed --
    #[error("origin timed out: {0}")]
    OriginTimeout(String),

    #[error("origin error: {0}")]
    OriginError(String),

    #[error("origin unreachable: {0}")]
    OriginUnreachable(String),

    // -- Internal errors: 500 --
    #[error("internal error: {0}")]
    Internal(String),

    #[error("parse error: {0}")]
    ParseError(String),

    // -- Ambient / infrastructure --
    #[error("configuration error: {0}")]
    Config(Box<figment::Error>),

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(Box<sqlx::Error>),

    #[cfg(feature = "cache")]
    #[error("cache error: {0}")]
    Cache(Box<redis::RedisError>),

    #[error("jwt error: {0}")]
    Jwt(Box<jsonwebtoken::errors::Error>),

    #[error("http error: {0}")]
    Http(Box<axum::http::Error>),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Error code string carried in the JSON body, matching the taxonomy
    /// names used throughout the spec and audit records.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::InvalidBody(_) => "invalid_body",
            Error::PayloadTooLarge(..) => "payload_too_large",
            Error::InvalidEmail(_) => "invalid_email",
            Error::WeakPassword(_) => "weak_password",
            Error::Unauthorized(_) => "unauthorized",
            Error::InvalidToken(_) => "invalid_token",
            Error::InvalidCredentials => "invalid_credentials",
            Error::Forbidden(_) => "forbidden",
            Error::RateLimited { .. } => "rate_limited",
            Error::QueueFull(_) => "queue_full",
            Error::NoHandler(_) => "no_handler",
            Error::NoWebhookHandler(_) => "no_handler",
            Error::NoService { .. } => "no_service",
            Error::InvalidSignature => "invalid_signature",
            Error::TimestampExpired => "timestamp_expired",
            Error::OriginTimeout(_) => "origin_timeout",
            Error::OriginError(_) => "origin_error",
            Error::OriginUnreachable(_) => "origin_unreachable",
            Error::Internal(_) => "internal_error",
            Error::ParseError(_) => "parse_error",
            Error::Config(_) => "internal_error",
            #[cfg(feature = "database")]
            Error::Database(_) => "internal_error",
            #[cfg(feature = "cache")]
            Error::Cache(_) => "internal_error",
            Error::Jwt(_) => "invalid_token",
            Error::Http(_) => "invalid_request",
            Error::Io(_) => "internal_error",
        }
    }

    /// Whether this error always goes through the audit store regardless of
    /// the handler's own audit calls (routing failures, §7).
    pub fn always_audited(&self) -> bool {
        matches!(
            self,
            Error::NoHandler(_)
                | Error::NoWebhookHandler(_)
                | Error::NoService { .. }
                | Error::InvalidSignature
                | Error::TimestampExpired
        )
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            status: status.as_u16(),
        }
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = match &self {
            Error::InvalidRequest(_)
            | Error::InvalidBody(_)
            | Error::InvalidEmail(_)
            | Error::WeakPassword(_)
            | Error::Http(_)
            | Error::NoWebhookHandler(_)
            | Error::ParseError(_) => StatusCode::BAD_REQUEST,

            Error::PayloadTooLarge(..) => StatusCode::PAYLOAD_TOO_LARGE,

            Error::Unauthorized(_)
            | Error::InvalidToken(_)
            | Error::InvalidCredentials
            | Error::Jwt(_) => StatusCode::UNAUTHORIZED,

            Error::Forbidden(_) | Error::InvalidSignature | Error::TimestampExpired => {
                StatusCode::FORBIDDEN
            }

            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,

            Error::NoHandler(_) | Error::NoService { .. } => StatusCode::NOT_FOUND,

            Error::OriginTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::OriginError(_) | Error::OriginUnreachable(_) => StatusCode::BAD_GATEWAY,

            Error::Internal(_) | Error::Config(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            #[cfg(feature = "database")]
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            #[cfg(feature = "cache")]
            Error::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Auth errors log at INFO, rate limiting at DEBUG, routing failures
        // and internal/upstream errors at ERROR; everything else is 4xx noise.
        match &self {
            Error::Unauthorized(msg) | Error::InvalidToken(msg) => {
                tracing::info!(code, "{msg}")
            }
            Error::InvalidCredentials => tracing::info!(code, "invalid credentials"),
            Error::Forbidden(msg) => tracing::info!(code, "{msg}"),
            Error::RateLimited { retry_after_secs } => {
                tracing::debug!(code, retry_after_secs, "rate limited")
            }
            Error::QueueFull(msg) => tracing::warn!(code, "{msg}"),
            Error::NoHandler(msg) | Error::NoWebhookHandler(msg) => tracing::warn!(code, "{msg}"),
            Error::NoService { org, service } => {
                tracing::warn!(code, org, service, "no service registered")
            }
            Error::InvalidSignature => tracing::warn!(code, "invalid webhook signature"),
            Error::TimestampExpired => tracing::warn!(code, "webhook timestamp expired"),
            Error::OriginTimeout(msg) => tracing::error!(code, "{msg}"),
            Error::OriginError(msg) => tracing::error!(code, "{msg}"),
            Error::OriginUnreachable(msg) => tracing::error!(code, "{msg}"),
            Error::Internal(msg) => tracing::error!(code, "{msg}"),
            Error::ParseError(msg) => tracing::debug!(code, "{msg}"),
            Error::Config(e) => tracing::error!(code, "{e}"),
            #[cfg(feature = "database")]
            Error::Database(e) => tracing::error!(code, "{e}"),
            #[cfg(feature = "cache")]
            Error::Cache(e) => tracing::error!(code, "{e}"),
            Error::Io(e) => tracing::error!(code, "{e}"),
            _ => {}
        }

        let mut response = (status, Json(ErrorResponse::new(status, code, self.to_string())))
            .into_response();

        if let Error::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Database(Box::new(err))
    }
}

#[cfg(feature = "cache")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Cache(Box::new(err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Jwt(Box::new(err))
    }
}

impl From<axum::http::Error> for Error {
    fn from(err: axum::http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_code_and_status() {
        let err = Error::NoService {
            org: "FND".into(),
            service: "salesforce".into(),
        };
        assert_eq!(err.code(), "no_service");
        assert!(err.always_audited());
    }

    #[test]
    fn rate_limited_maps_to_429_with_retry_after() {
        let err = Error::RateLimited {
            retry_after_secs: 42,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::RETRY_AFTER)
                .unwrap(),
            "42"
        );
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        let err = Error::PayloadTooLarge(20_000_000, 10_485_760);
        assert_eq!(err.code(), "payload_too_large");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn invalid_signature_and_timestamp_expired_are_403_and_audited() {
        assert_eq!(Error::InvalidSignature.code(), "invalid_signature");
        assert!(Error::InvalidSignature.always_audited());
        assert_eq!(Error::TimestampExpired.code(), "timestamp_expired");
        assert!(Error::TimestampExpired.always_audited());
    }

    #[test]
    fn no_webhook_handler_maps_to_400_distinct_from_proxy_no_handler() {
        let webhook_err = Error::NoWebhookHandler("unknown provider".to_string());
        assert_eq!(webhook_err.code(), "no_handler");
        assert!(webhook_err.always_audited());
        assert_eq!(webhook_err.into_response().status(), StatusCode::BAD_REQUEST);

        let proxy_err = Error::NoHandler("/v1/unknown".to_string());
        assert_eq!(proxy_err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_credentials_does_not_leak_detail() {
        let err = Error::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
