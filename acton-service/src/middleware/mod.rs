//! Request middleware: JWT validation, the combined gateway auth/rate-limit
//! layer, CORS, and the static security-header set applied to every
//! response (§4.1).

pub mod cors;
pub mod gateway;
pub mod jwt;
pub mod security_headers;

pub use cors::cors_layer;
pub use gateway::{authenticate_layer, AuthContext};
pub use jwt::{Claims, JwtAuth};
pub use security_headers::apply_security_headers;

use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;

/// Header carrying the per-request correlation id (§4.1 `request_id` on
/// every error body).
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamp every inbound request with a UUID request id if it doesn't
/// already carry one.
pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(
        axum::http::HeaderName::from_static(REQUEST_ID_HEADER),
        MakeRequestUuid,
    )
}

/// Copy the request id onto the outbound response so callers can correlate
/// a `500 internal_error` body back to server-side logs.
pub fn request_id_propagation_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(axum::http::HeaderName::from_static(REQUEST_ID_HEADER))
}

/// Strip credentials from request/response traces before they reach the
/// tracing subscriber.
pub fn sensitive_headers_layer() -> SetSensitiveHeadersLayer {
    SetSensitiveHeadersLayer::new([
        axum::http::header::AUTHORIZATION,
        axum::http::header::COOKIE,
        axum::http::header::SET_COOKIE,
        axum::http::HeaderName::from_static("x-api-key"),
    ])
}
