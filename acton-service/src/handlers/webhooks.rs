//! `POST /v1/webhooks/{provider}`: verify, parse, and enqueue an inbound
//! webhook (§4.4/§6). Public -- webhooks authenticate via their own
//! signature, not a bearer credential.
//!
//! The verify outcome is audited synchronously -- a rejection is appended
//! before the error response is returned, and a success is appended before
//! the ack is returned -- so no outcome depends on the generic bus listener
//! ever running (§4.5).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::audit::AuditOutcome;
use crate::error::Result;
use crate::state::AppState;
use crate::webhook::{self, IntakeAck};

pub async fn intake(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IntakeAck>> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let outcome = webhook::intake(
        &state.webhook_providers,
        &state.webhook_secrets,
        Some(provider.as_str()),
        &headers,
        &body,
        now_ms,
    );

    let (signal, source) = match outcome {
        Ok(ok) => ok,
        Err(err) => {
            if err.always_audited() {
                let rejected = webhook::rejection_signal(&provider, &err, now_ms);
                state.bus.publish(rejected.clone());
                state
                    .audit
                    .append(rejected, provider.as_str(), "webhook.rejected", provider.as_str(), AuditOutcome::Failure)
                    .await;
            }
            return Err(err);
        }
    };

    let verified = webhook::verified_signal(source, &signal.target, now_ms);
    state.bus.publish(verified.clone());
    state
        .audit
        .append(verified, source, "webhook.verified", signal.target.clone(), AuditOutcome::Success)
        .await;

    state.webhook_queue.try_enqueue(signal)?;

    Ok(Json(IntakeAck {
        received: true,
        source: source.to_string(),
        queued: true,
    }))
}
