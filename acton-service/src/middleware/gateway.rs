//! The gateway's combined authentication and rate-limiting middleware
//! (§4.1). Runs once, over the whole router, ahead of every handler except
//! the public surface (`/health`, `/v1/status`, `/v1/auth/*`, the webhook
//! intake endpoints, and the websocket upgrade, which authenticates itself).
//!
//! Credential resolution tries, in order: a bearer JWT, an `X-API-Key`
//! header, then a session cookie -- the first one present wins, and an
//! absent/invalid credential on a protected path is `401`.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::agents::RateLimitOutcome;
use crate::auth::{ApiKey, User};
use crate::error::{Error, Result};
use crate::middleware::jwt::{Claims, JwtAuth};
use crate::signal::{Signal, SignalType};
use crate::state::AppState;

/// Paths that never require a credential or a rate-limit check. Matched as
/// an exact string or a prefix ending in `/`.
const PUBLIC_PREFIXES: &[&str] = &[
    "/health",
    "/v1/status",
    "/v1/auth/login",
    "/v1/auth/register",
    "/v1/auth/refresh",
    "/v1/webhooks/",
    "/v1/ws",
];

fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|p| path == *p || path.starts_with(p))
}

/// The authenticated caller, attached to request extensions for handlers
/// that need it (e.g. `/v1/signals` visibility, `/v1/auth/refresh`).
#[derive(Debug, Clone)]
pub enum AuthContext {
    Bearer(Claims),
    ApiKey(ApiKey),
    Session { user: User },
}

impl AuthContext {
    /// The identity string the rate limiter buckets on (§3 rate-limit
    /// identity: per-user or per-API-key, never per-IP).
    pub fn rate_limit_identity(&self) -> String {
        match self {
            AuthContext::Bearer(claims) => format!("sub:{}", claims.sub),
            AuthContext::ApiKey(key) => format!("key:{}", key.id),
            AuthContext::Session { user } => format!("user:{}", user.id),
        }
    }

    /// Admin-scoped callers see `dev_only` signals and may trigger a
    /// registry reload; everyone else is scoped to their own traffic.
    pub fn is_admin(&self) -> bool {
        match self {
            AuthContext::Bearer(claims) => claims.has_role("admin"),
            AuthContext::ApiKey(key) => key.has_scope("admin"),
            AuthContext::Session { user } => user.role == "admin",
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        match self {
            AuthContext::Bearer(claims) => claims.has_permission(scope) || claims.has_role("admin"),
            AuthContext::ApiKey(key) => key.has_scope(scope) || key.has_scope("admin"),
            AuthContext::Session { user } => user.role == "admin",
        }
    }
}

/// Parse a `Cookie` header into name/value pairs. No cookie-parsing crate is
/// part of this stack, and the gateway only ever needs one named cookie, so
/// a small manual splitter is simpler than a dependency.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(raw) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return out;
    };
    for pair in raw.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            out.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    out
}

async fn resolve_credential(state: &AppState, headers: &HeaderMap, now_ms: i64) -> Result<AuthContext> {
    if headers.contains_key(header::AUTHORIZATION) {
        let token = JwtAuth::extract_token(headers)?;
        let claims = state.jwt_auth.validate_token(&token)?;
        return Ok(AuthContext::Bearer(claims));
    }

    if let Some(raw_key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let key = {
            let store = state.api_keys.read().expect("api key store poisoned");
            store.verify(raw_key, now_ms)?.clone()
        };
        return Ok(AuthContext::ApiKey(key));
    }

    let cookies = parse_cookies(headers);
    if let Some(session_id) = cookies.get(&state.config.session.cookie_name) {
        let session = state
            .sessions
            .get(session_id, now_ms)
            .await
            .ok_or_else(|| Error::Unauthorized("session expired or unknown".to_string()))?;
        let user = state
            .users
            .by_id(&session.user_id)
            .ok_or_else(|| Error::Unauthorized("session references an unknown user".to_string()))?;
        return Ok(AuthContext::Session { user });
    }

    Err(Error::Unauthorized("no credential presented".to_string()))
}

fn signal_data(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Authenticate and rate-limit every request against a non-public path.
/// Extracted method/path/headers first so the `Content-Length` check (§4.1
/// the 10 MiB cap rejects `413` *before* any body is read) happens ahead of
/// anything that might buffer the body.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> std::result::Result<Response, Error> {
    let path = request.uri().path().to_string();

    if let Some(content_length) = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        let limit = state.config.timeouts.body_limit_bytes;
        if content_length > limit {
            return Err(Error::PayloadTooLarge(content_length, limit));
        }
    }

    if is_public(&path) {
        return Ok(next.run(request).await);
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let auth = resolve_credential(&state, request.headers(), now_ms).await?;

    let identity = auth.rate_limit_identity();
    match state.rate_limiter.check(&identity, now_ms).await {
        Some(RateLimitOutcome::Allowed { .. }) => {}
        Some(RateLimitOutcome::Denied { retry_after_secs }) => {
            state.bus.publish(Signal::new(
                SignalType::RateLimited,
                "gateway",
                identity.as_str(),
                now_ms,
                signal_data(&[("path", Value::String(path.clone()))]),
            ));
            return Err(Error::RateLimited { retry_after_secs });
        }
        None => {
            state.bus.publish(Signal::new(
                SignalType::RateLimitUnavailable,
                "gateway",
                identity.as_str(),
                now_ms,
                signal_data(&[("path", Value::String(path.clone()))]),
            ));
            // Fail open: the rate limiter not answering in time must not
            // itself become an outage (§4.1/§5).
        }
    }

    let mut request = request;
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Convert the gateway's internal `Result<Response, Error>` into axum's
/// expected `IntoResponse`-compatible signature for `from_fn_with_state`.
pub async fn authenticate_layer(state: State<AppState>, request: Request<Body>, next: Next) -> Response {
    match authenticate(state, request, next).await {
        Ok(response) => response,
        Err(error) => axum::response::IntoResponse::into_response(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn public_prefixes_match_exactly_and_by_prefix() {
        assert!(is_public("/health"));
        assert!(is_public("/v1/status"));
        assert!(is_public("/v1/webhooks/github"));
        assert!(is_public("/v1/auth/login"));
        assert!(!is_public("/v1/route"));
        assert!(!is_public("/v1/auth/logout"));
    }

    #[test]
    fn cookie_header_parses_multiple_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("acton_session=abc123; other=value"),
        );
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.get("acton_session").unwrap(), "abc123");
        assert_eq!(cookies.get("other").unwrap(), "value");
    }

    #[test]
    fn missing_cookie_header_yields_empty_map() {
        let headers = HeaderMap::new();
        assert!(parse_cookies(&headers).is_empty());
    }
}
