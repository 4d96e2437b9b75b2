//! Webhook ingestion: verify, parse to a canonical [`Signal`], and enqueue
//! the parsed event for asynchronous fan-out. The verify/parse outcome
//! itself (`webhook.verified` or `webhook.rejected`) is built here and
//! audited synchronously by the handler before the HTTP response returns
//! (§4.4, §4.5).

pub mod providers;

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::signal::{Signal, SignalBus, SignalType};
use providers::{Provider, VerifyOutcome};

/// Per-provider shared secrets, read from configuration at startup. Absent
/// entries mean verification is skipped for that provider (§4.4).
#[derive(Debug, Clone, Default)]
pub struct WebhookSecrets {
    pub by_provider: HashMap<String, String>,
}

impl WebhookSecrets {
    pub fn get(&self, provider: &str) -> Option<&str> {
        self.by_provider.get(provider).map(String::as_str)
    }
}

/// The set of named webhook sources this gateway understands.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            providers: vec![
                Box::new(providers::GitHub),
                Box::new(providers::Stripe),
                Box::new(providers::Slack),
                providers::salesforce(),
                providers::cloudflare(),
                providers::google(),
                providers::figma(),
            ],
        }
    }
}

impl ProviderRegistry {
    /// Resolve a provider by explicit hint (bypasses fingerprint detection)
    /// or, absent a hint, by the first handler whose `can_handle` matches.
    pub fn resolve(&self, provider_hint: Option<&str>, headers: &HeaderMap) -> Option<&dyn Provider> {
        if let Some(hint) = provider_hint {
            return self
                .providers
                .iter()
                .find(|p| p.name() == hint)
                .map(|p| p.as_ref());
        }
        self.providers
            .iter()
            .find(|p| p.can_handle(headers))
            .map(|p| p.as_ref())
    }
}

/// The outcome of a successful intake, returned to the HTTP caller
/// immediately; the audit append and bus publish happen afterward (§4.4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct IntakeAck {
    pub received: bool,
    pub source: String,
    pub queued: bool,
}

/// Bounded channel carrying verified-and-parsed signals from the HTTP
/// handler to the background worker that appends/publishes them. Default
/// capacity 1024 (§5 backpressure).
pub struct WebhookQueue {
    tx: mpsc::Sender<Signal>,
}

impl WebhookQueue {
    pub fn new(capacity: usize, bus: SignalBus) -> Self {
        let (tx, mut rx) = mpsc::channel::<Signal>(capacity);
        tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                bus.publish(signal);
            }
        });
        Self { tx }
    }

    /// Non-blocking enqueue; a full queue surfaces as `503 queue_full`
    /// immediately rather than making the caller wait (§5).
    pub fn try_enqueue(&self, signal: Signal) -> Result<()> {
        self.tx
            .try_send(signal)
            .map_err(|_| Error::QueueFull("webhook queue is full".to_string()))
    }
}

/// Verify and parse an inbound webhook, returning the signal to enqueue
/// plus the provider name used in the HTTP ack. Never touches the audit
/// store or signal bus directly — that's the queue's job.
pub fn intake(
    registry: &ProviderRegistry,
    secrets: &WebhookSecrets,
    provider_hint: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
    now_ms: i64,
) -> Result<(Signal, &'static str)> {
    let provider = registry
        .resolve(provider_hint, headers)
        .ok_or_else(|| Error::NoWebhookHandler("no webhook handler matched this request".to_string()))?;

    let secret = secrets.get(provider.name());
    let outcome = provider.verify(body, headers, secret, now_ms)?;

    let mut signal = provider.parse(body, headers, now_ms)?;
    if outcome == VerifyOutcome::Skipped {
        signal.data.insert(
            "dev_only".to_string(),
            serde_json::Value::Bool(true),
        );
    }

    Ok((signal, provider.name()))
}

/// Build the `webhook.rejected` signal for a verify/resolve failure the
/// handler decided is audit-worthy (`Error::always_audited`). `provider_hint`
/// is whatever the caller named in the URL, known even when no registered
/// provider matched it.
pub fn rejection_signal(provider_hint: &str, err: &Error, now_ms: i64) -> Signal {
    let mut data = HashMap::new();
    data.insert("code".to_string(), Value::String(err.code().to_string()));
    data.insert("reason".to_string(), Value::String(err.to_string()));
    Signal::new(SignalType::WebhookRejected, provider_hint, provider_hint, now_ms, data)
}

/// Build the `webhook.verified` signal emitted once a provider's signature
/// has checked out, alongside the provider's own parsed event signal.
pub fn verified_signal(provider: &str, target: &str, now_ms: i64) -> Signal {
    Signal::new(SignalType::WebhookVerified, provider, target, now_ms, HashMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::GitHub;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn resolve_by_hint_bypasses_fingerprint() {
        let registry = ProviderRegistry::default();
        let h = headers(&[]);
        assert!(registry.resolve(Some("github"), &h).is_some());
    }

    #[test]
    fn resolve_by_fingerprint_when_no_hint() {
        let registry = ProviderRegistry::default();
        let h = headers(&[("x-github-event", "push")]);
        assert_eq!(registry.resolve(None, &h).unwrap().name(), "github");
    }

    #[test]
    fn no_handler_when_nothing_matches() {
        let registry = ProviderRegistry::default();
        let h = headers(&[]);
        assert!(registry.resolve(None, &h).is_none());
    }

    #[test]
    fn intake_marks_dev_only_when_no_secret_configured() {
        let registry = ProviderRegistry::default();
        let secrets = WebhookSecrets::default();
        let body = br#"{"action":"opened","repository":{"full_name":"OS/thing"}}"#;
        let h = headers(&[("x-github-event", "issues")]);

        let (signal, source) = intake(&registry, &secrets, None, &h, body, 0).unwrap();
        assert_eq!(source, "github");
        assert_eq!(signal.data.get("dev_only"), Some(&serde_json::Value::Bool(true)));
    }

    #[test]
    fn intake_rejects_invalid_signature_when_secret_configured() {
        let registry = ProviderRegistry::default();
        let mut secrets = WebhookSecrets::default();
        secrets.by_provider.insert("github".to_string(), "real-secret".to_string());
        let body = br#"{"action":"opened"}"#;
        let h = headers(&[
            ("x-github-event", "issues"),
            ("x-hub-signature-256", "sha256=wrong"),
        ]);

        let result = intake(&registry, &secrets, None, &h, body, 0);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        assert!(result.unwrap_err().always_audited());
    }

    #[test]
    fn unmatched_provider_hint_is_audit_worthy_and_maps_to_400() {
        let registry = ProviderRegistry::default();
        let secrets = WebhookSecrets::default();
        let h = headers(&[]);

        let err = intake(&registry, &secrets, Some("unknown-provider"), &h, b"{}", 0).unwrap_err();
        assert!(matches!(err, Error::NoWebhookHandler(_)));
        assert!(err.always_audited());
    }

    #[test]
    fn rejection_signal_carries_the_triggering_error_code() {
        let signal = rejection_signal("github", &Error::InvalidSignature, 0);
        assert_eq!(signal.kind, SignalType::WebhookRejected);
        assert_eq!(signal.data.get("code").and_then(Value::as_str), Some("invalid_signature"));
    }

    #[test]
    fn verified_signal_carries_the_resolved_provider_and_target() {
        let signal = verified_signal("github", "AI", 0);
        assert_eq!(signal.kind, SignalType::WebhookVerified);
        assert_eq!(signal.source, "github");
        assert_eq!(signal.target, "AI");
    }

    #[tokio::test]
    async fn two_valid_webhooks_with_identical_body_enqueue_two_signals() {
        let bus = SignalBus::new(16);
        let queue = WebhookQueue::new(8, bus.clone());
        let mut rx = bus.subscribe();

        let provider = GitHub;
        let body = br#"{"action":"opened"}"#;
        let h = headers(&[("x-github-event", "issues")]);
        let s1 = provider.parse(body, &h, 1).unwrap();
        let s2 = provider.parse(body, &h, 2).unwrap();

        queue.try_enqueue(s1.clone()).unwrap();
        queue.try_enqueue(s2.clone()).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn full_queue_surfaces_as_queue_full() {
        let bus = SignalBus::new(1);
        // Capacity 1 with nothing draining it yet; fill then overflow.
        let (tx, _rx) = mpsc::channel::<Signal>(1);
        let queue = WebhookQueue { tx };
        let provider = GitHub;
        let body = br#"{"action":"opened"}"#;
        let h = headers(&[]);
        let signal = provider.parse(body, &h, 0).unwrap();

        queue.try_enqueue(signal.clone()).unwrap();
        assert!(matches!(queue.try_enqueue(signal), Err(Error::QueueFull(_))));
        drop(bus);
    }
}
