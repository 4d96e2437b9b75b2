//! `POST /v1/route`: classify free text into an `(org, service)` target and
//! dispatch it (§4.2/§4.3/§6). The response carries only the classification
//! -- dispatch outcome is observable through the emitted signal and the
//! audit trail, not the HTTP response body.

use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::AuditOutcome;
use crate::error::Result;
use crate::middleware::gateway::AuthContext;
use crate::signal::{Signal, SignalType};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub query: String,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub org: String,
    pub service: String,
    pub confidence: f64,
    pub request_id: String,
}

pub async fn route(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(body): Json<RouteRequest>,
) -> Result<Json<RouteResponse>> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let request_id = Uuid::new_v4().to_string();
    let registry = state.registry.load();
    let classification = state.classifier.classify(&registry, &body.query);

    let mut request_data: HashMap<String, Value> = HashMap::new();
    request_data.insert("request_id".to_string(), Value::String(request_id.clone()));
    request_data.insert("identity".to_string(), Value::String(auth.rate_limit_identity()));
    state.bus.publish(Signal::new(
        SignalType::RouteRequest,
        "OS",
        classification.org(),
        now_ms,
        request_data,
    ));

    let payload = serde_json::json!({
        "query": body.query,
        "context": body.context.unwrap_or(Value::Null),
    });

    let (_result, dispatch_signal) = state
        .dispatcher
        .dispatch(&registry, &request_id, &classification, &payload)
        .await;

    // Appended synchronously so `route.complete`/`route.failed` is in the
    // audit store before this handler returns (§4.5, §8 property 5); the
    // generic bus listener skips these two kinds to avoid double-appending.
    let outcome = if dispatch_signal.kind == SignalType::RouteComplete {
        AuditOutcome::Success
    } else {
        AuditOutcome::Failure
    };
    state
        .audit
        .append(
            dispatch_signal.clone(),
            dispatch_signal.source.clone(),
            dispatch_signal.kind.as_str().to_string(),
            dispatch_signal.target.clone(),
            outcome,
        )
        .await;
    state.bus.publish(dispatch_signal);

    Ok(Json(RouteResponse {
        org: classification.org().to_string(),
        service: classification.service().to_string(),
        confidence: classification.confidence(),
        request_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditQuery;
    use crate::auth::User;
    use crate::state::fixtures::test_state;

    fn session_auth() -> AuthContext {
        AuthContext::Session {
            user: User {
                id: "u1".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                password_hash: String::new(),
                role: "user".to_string(),
                created_ms: 0,
            },
        }
    }

    #[tokio::test]
    async fn route_complete_is_in_the_audit_store_as_soon_as_the_handler_returns() {
        let (state, runtime, _dir) = test_state().await;

        let Json(response) = route(
            State(state.clone()),
            Extension(session_auth()),
            Json(RouteRequest { query: "route something".to_string(), context: None }),
        )
        .await
        .unwrap();

        // No sleep/yield_now: if the dispatch record only reached the store
        // through the async bus listener, this query would race it and the
        // assertion below would be flaky rather than reliably failing.
        let records = state.audit.query(&AuditQuery::default()).await;
        assert!(records
            .iter()
            .any(|r| r.resource == format!("{}/{}", response.org, response.service)
                && (r.action == "route.complete" || r.action == "route.failed")));

        runtime.shutdown_all().await.ok();
    }
}
