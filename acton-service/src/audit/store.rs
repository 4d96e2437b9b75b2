//! Append-only, hash-chained audit store.
//!
//! Appends are serialized through a single `tokio::sync::Mutex` guarding the
//! chain state and the backing `Vec`, so `sequence`/`previous_hash` can never
//! race. Queries take a read-only snapshot and never block an in-flight
//! append for longer than the clone.

use chrono::Utc;
use tokio::sync::Mutex;

use super::chain::AuditChain;
use super::event::{AuditOutcome, AuditRecord};
use crate::signal::{Signal, SignalBus, SignalType};

struct Inner {
    chain: AuditChain,
    records: Vec<AuditRecord>,
}

pub struct AuditStore {
    inner: Mutex<Inner>,
    retention_days: u32,
}

#[derive(Debug, Default, Clone)]
pub struct AuditQuery {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub since_ms: Option<i64>,
}

impl AuditStore {
    pub fn new(retention_days: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                chain: AuditChain::new(),
                records: Vec::new(),
            }),
            retention_days,
        }
    }

    /// Append a record, sealing it into the hash chain. Returns the sealed
    /// record (with its assigned sequence and hash).
    pub async fn append(
        &self,
        signal: Signal,
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: AuditOutcome,
    ) -> AuditRecord {
        let record = AuditRecord::new(signal, actor, action, resource, outcome);
        let mut inner = self.inner.lock().await;
        let sealed = inner.chain.seal(record);
        inner.records.push(sealed.clone());
        sealed
    }

    pub async fn query(&self, query: &AuditQuery) -> Vec<AuditRecord> {
        let inner = self.inner.lock().await;
        inner
            .records
            .iter()
            .filter(|r| query.actor.as_deref().map_or(true, |a| a == r.actor))
            .filter(|r| query.action.as_deref().map_or(true, |a| a == r.action))
            .filter(|r| query.resource.as_deref().map_or(true, |r2| r2 == r.resource))
            .filter(|r| query.since_ms.map_or(true, |since| r.timestamp_ms >= since))
            .cloned()
            .collect()
    }

    /// Verify the whole chain is intact.
    pub async fn verify(&self) -> Result<(), super::chain::ChainVerificationError> {
        let inner = self.inner.lock().await;
        super::chain::verify_chain(&inner.records)
    }

    /// Export every record as a JSONL-friendly list (caller writes it out).
    pub async fn export(&self) -> Vec<AuditRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Drop records older than the configured retention window. Does not
    /// rewrite the hash chain — retained records keep their original
    /// `previous_hash`, which therefore no longer points at a record in the
    /// trimmed set; `verify_chain` is only meaningful over an untrimmed
    /// export.
    pub async fn compact(&self) -> usize {
        let cutoff_ms = Utc::now().timestamp_millis() - i64::from(self.retention_days) * 86_400_000;
        let mut inner = self.inner.lock().await;
        let before = inner.records.len();
        inner.records.retain(|r| r.timestamp_ms >= cutoff_ms);
        before - inner.records.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Spawn a background sweep that calls [`Self::compact`] on a fixed
    /// interval, so the configured `retention_days` window (§3 Lifecycles,
    /// §4.5 Retention) is actually enforced rather than just recorded.
    pub fn spawn_retention_sweep(self: std::sync::Arc<Self>, interval_hours: u32) {
        let period = std::time::Duration::from_secs(u64::from(interval_hours.max(1)) * 3600);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let dropped = self.compact().await;
                if dropped > 0 {
                    tracing::info!(dropped, "audit retention sweep trimmed expired records");
                }
            }
        });
    }

    /// Subscribe to a signal bus and append every signal it emits as a
    /// generic audit record (`actor=<signal source>`, `action=<signal
    /// type>`, `resource=<target>`). Callers that need a richer actor/
    /// action/resource triple should call `append` directly instead of
    /// relying on this generic listener; it exists so no signal silently
    /// goes unaudited.
    ///
    /// `route.complete`/`route.failed` and `webhook.verified`/
    /// `webhook.rejected` are excluded: the handlers that produce them
    /// append synchronously, before their HTTP response returns (§4.5, §8
    /// property 5), so appending them again here would double the record.
    pub fn spawn_bus_listener(self: std::sync::Arc<Self>, bus: &SignalBus) {
        let mut receiver = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(signal) => {
                        if matches!(
                            signal.kind,
                            SignalType::RouteComplete
                                | SignalType::RouteFailed
                                | SignalType::WebhookVerified
                                | SignalType::WebhookRejected
                        ) {
                            continue;
                        }
                        let outcome = match signal.kind {
                            SignalType::AuthFailed
                            | SignalType::RateLimited
                            | SignalType::RateLimitUnavailable => AuditOutcome::Failure,
                            _ => AuditOutcome::Success,
                        };
                        let action = signal.kind.as_str().to_string();
                        let resource = signal.target.clone();
                        let actor = signal.source.clone();
                        self.append(signal, actor, action, resource, outcome).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}
