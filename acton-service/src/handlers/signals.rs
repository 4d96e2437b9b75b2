//! `GET`/`POST /v1/signals` (§4.5/§6): query the audited signal history, or
//! publish a new signal onto the bus. Publishing requires the
//! `signals:emit` scope -- an admin role always satisfies it.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::AuditQuery;
use crate::error::{Error, Result};
use crate::middleware::gateway::AuthContext;
use crate::signal::{Signal, SignalType};
use crate::state::AppState;

const EMIT_SCOPE: &str = "signals:emit";
const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub source: Option<String>,
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    axum::extract::Query(params): axum::extract::Query<SignalsQuery>,
) -> Result<Json<Vec<Signal>>> {
    let query = AuditQuery {
        actor: params.source,
        action: params.kind,
        resource: None,
        since_ms: params.since,
    };

    let records = state.audit.query(&query).await;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    let signals: Vec<Signal> = records
        .into_iter()
        .filter(|record| auth.is_admin() || record.signal.data.get("dev_only") != Some(&Value::Bool(true)))
        .map(|record| record.signal)
        .rev()
        .take(limit)
        .collect();

    Ok(Json(signals))
}

#[derive(Debug, Deserialize)]
pub struct PublishSignalRequest {
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub target: String,
    #[serde(default)]
    pub data: HashMap<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct PublishSignalResponse {
    pub id: String,
}

pub async fn publish(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<PublishSignalRequest>,
) -> Result<Json<PublishSignalResponse>> {
    if !auth.has_scope(EMIT_SCOPE) {
        return Err(Error::Forbidden(format!("missing required scope: {EMIT_SCOPE}")));
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let source = match &auth {
        AuthContext::Bearer(claims) => claims.sub.clone(),
        AuthContext::ApiKey(key) => format!("key:{}", key.id),
        AuthContext::Session { user } => format!("user:{}", user.id),
    };

    let signal = Signal::new(body.kind, source, body.target, now_ms, body.data);
    let id = signal.id.clone();
    state.bus.publish(signal);

    Ok(Json(PublishSignalResponse { id }))
}
