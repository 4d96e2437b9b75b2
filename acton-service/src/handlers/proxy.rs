//! Catch-all fallback: anything that didn't match a named route is
//! forwarded to the resolved origin pool (§6, `Proxy::forward`).

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
};

use crate::error::Result;
use crate::state::AppState;

pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, HeaderMap, Body)> {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
    state.proxy.forward(method, path, &headers, body.to_vec()).await
}
