//! Origin proxy: forwards a request to one of four backend pools selected
//! by path prefix, preserving method/headers/body and streaming the
//! response back (§4.1, §6).

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Client;

use crate::dispatcher::{Call, CallOutcome};
use crate::error::{Error, Result};
use crate::sql_guard;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

/// One of the four backend pools a request can be forwarded to (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Primary,
    Storage,
    Agents,
}

impl Origin {
    fn as_str(&self) -> &'static str {
        match self {
            Origin::Primary => "primary",
            Origin::Storage => "storage",
            Origin::Agents => "agents",
        }
    }
}

/// Declarative path-prefix to origin mapping (§6). Longest-prefix-first so
/// `/v1/ai/agents` doesn't fall through to a shorter unrelated prefix.
const ROUTES: &[(&str, Origin)] = &[
    ("/v1/route", Origin::Primary),
    ("/v1/bridge", Origin::Primary),
    ("/v1/signals", Origin::Primary),
    ("/v1/metrics", Origin::Primary),
    ("/v1/storage", Origin::Storage),
    ("/v1/db", Origin::Storage),
    ("/v1/edu/", Origin::Storage),
    ("/v1/arc/", Origin::Storage),
    ("/v1/ai/agents", Origin::Agents),
    ("/v1/int/", Origin::Agents),
    ("/v1/med/", Origin::Agents),
    ("/v1/stu/", Origin::Agents),
    ("/v1/lab/", Origin::Agents),
    ("/v1/jobs", Origin::Agents),
];

/// Resolve which origin pool a request path belongs to.
pub fn resolve_origin(path: &str) -> Option<Origin> {
    ROUTES
        .iter()
        .filter(|(prefix, _)| path.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, origin)| *origin)
}

/// Base URLs for each origin pool, loaded from configuration.
#[derive(Debug, Clone)]
pub struct OriginPools {
    pub primary: String,
    pub storage: String,
    pub agents: String,
}

impl OriginPools {
    fn base_url(&self, origin: Origin) -> &str {
        match origin {
            Origin::Primary => &self.primary,
            Origin::Storage => &self.storage,
            Origin::Agents => &self.agents,
        }
    }
}

/// Forwards requests to origin pools over a shared reqwest client. Strips
/// any inbound `Authorization` header and attaches the internal service
/// token instead, so origins never see a caller's bearer credential.
pub struct Proxy {
    client: Client,
    pools: OriginPools,
    internal_token: String,
}

impl Proxy {
    pub fn new(pools: OriginPools, internal_token: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build proxy http client: {e}")))?;
        Ok(Self {
            client,
            pools,
            internal_token,
        })
    }

    /// Forward one request. `path` includes the query string if present.
    /// Requests to the storage origin's `/v1/db` path additionally pass
    /// through the SQL allow-list guard before forwarding (§6).
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> Result<(StatusCode, HeaderMap, Body)> {
        let origin = resolve_origin(path).ok_or_else(|| Error::NoHandler(path.to_string()))?;

        if path.starts_with("/v1/db") {
            let statement = std::str::from_utf8(&body)
                .map_err(|_| Error::InvalidBody("request body is not valid utf-8".to_string()))?;
            sql_guard::check(statement)?;
        }

        let base = self.pools.base_url(origin);
        let url = format!("{base}{path}");

        let mut outbound_headers = headers.clone();
        outbound_headers.remove(axum::http::header::AUTHORIZATION);
        outbound_headers.insert(
            HeaderName::from_static("x-internal-token"),
            HeaderValue::from_str(&self.internal_token)
                .map_err(|e| Error::Internal(format!("invalid internal token: {e}")))?,
        );

        let response = self
            .client
            .request(method, &url)
            .headers(outbound_headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::OriginTimeout(format!("{} timed out", origin.as_str()))
                } else if e.is_connect() {
                    Error::OriginUnreachable(format!("{}: {e}", origin.as_str()))
                } else {
                    Error::OriginError(e.to_string())
                }
            })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let response_headers = response.headers().clone();
        let stream = response.bytes_stream();

        let mut headers_out = HeaderMap::new();
        for (name, value) in response_headers.iter() {
            if let Ok(name) = HeaderName::from_bytes(name.as_str().as_bytes()) {
                headers_out.insert(name, value.clone());
            }
        }

        Ok((status, headers_out, Body::from_stream(stream)))
    }
}

/// The dispatcher's production `Call` implementation: POSTs the payload as
/// JSON to the resolved endpoint over a shared reqwest client (§4.3).
pub struct HttpCaller {
    client: Client,
}

impl HttpCaller {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build dispatch http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Call for HttpCaller {
    async fn call(&self, endpoint: &str, payload: &serde_json::Value) -> CallOutcome {
        match self.client.post(endpoint).json(payload).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.json::<serde_json::Value>().await.ok();
                CallOutcome { status, body, error: None }
            }
            Err(e) => {
                let status = if e.is_timeout() { 504 } else { 502 };
                CallOutcome { status, body: None, error: Some(e.to_string()) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_table_resolves_each_declared_prefix() {
        assert_eq!(resolve_origin("/v1/route"), Some(Origin::Primary));
        assert_eq!(resolve_origin("/v1/signals?type=x"), Some(Origin::Primary));
        assert_eq!(resolve_origin("/v1/db"), Some(Origin::Storage));
        assert_eq!(resolve_origin("/v1/edu/courses"), Some(Origin::Storage));
        assert_eq!(resolve_origin("/v1/ai/agents/1"), Some(Origin::Agents));
        assert_eq!(resolve_origin("/v1/jobs"), Some(Origin::Agents));
    }

    #[test]
    fn unknown_prefix_resolves_to_nothing() {
        assert_eq!(resolve_origin("/v1/unknown"), None);
    }

    #[test]
    fn longest_prefix_wins_for_overlapping_routes() {
        // "/v1/ai/agents" (Agents) is more specific than any Primary prefix
        // it might otherwise share a leading segment with.
        assert_eq!(resolve_origin("/v1/ai/agents"), Some(Origin::Agents));
    }
}
