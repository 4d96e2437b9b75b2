//! Signals: the typed events emitted by every router component and fanned
//! out to the audit store, websocket rooms, and metrics counters.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// The fixed set of signal types the router emits. `Other` covers anything
/// a future component needs without widening this enum every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    RouteRequest,
    RouteComplete,
    RouteFailed,
    WebhookReceived,
    WebhookVerified,
    WebhookRejected,
    PrOpened,
    IssueOpened,
    PaymentReceived,
    AuthLogin,
    AuthFailed,
    ConfigChanged,
    NodeOnline,
    NodeOffline,
    BudgetAlert,
    RateLimitUnavailable,
    RateLimited,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RouteRequest => "route.request",
            Self::RouteComplete => "route.complete",
            Self::RouteFailed => "route.failed",
            Self::WebhookReceived => "webhook.received",
            Self::WebhookVerified => "webhook.verified",
            Self::WebhookRejected => "webhook.rejected",
            Self::PrOpened => "pr.opened",
            Self::IssueOpened => "issue.opened",
            Self::PaymentReceived => "payment.received",
            Self::AuthLogin => "auth.login",
            Self::AuthFailed => "auth.failed",
            Self::ConfigChanged => "config.changed",
            Self::NodeOnline => "node.online",
            Self::NodeOffline => "node.offline",
            Self::BudgetAlert => "budget.alert",
            Self::RateLimitUnavailable => "rate_limit.unavailable",
            Self::RateLimited => "rate_limited",
        }
    }

    /// A single-glyph marker used in `Signal::formatted`, loosely grouped by
    /// severity: failures get a harsher glyph than routine traffic.
    fn glyph(&self) -> &'static str {
        match self {
            Self::RouteFailed | Self::WebhookRejected | Self::AuthFailed => "!",
            Self::RateLimited | Self::RateLimitUnavailable | Self::BudgetAlert => "~",
            Self::NodeOffline => "x",
            _ => ">",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed event flowing through the router. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SignalType,
    pub source: String,
    pub target: String,
    pub timestamp: i64,
    pub data: HashMap<String, Value>,
    pub formatted: String,
}

impl Signal {
    pub fn new(
        kind: SignalType,
        source: impl Into<String>,
        target: impl Into<String>,
        timestamp_ms: i64,
        data: HashMap<String, Value>,
    ) -> Self {
        let source = source.into();
        let target = target.into();
        let body_hash = blake3::hash(
            serde_json::to_string(&data)
                .unwrap_or_default()
                .as_bytes(),
        );
        let id = format!(
            "{}-{}-{}-{}",
            kind.as_str(),
            source,
            timestamp_ms,
            &body_hash.to_hex()[..16]
        );
        let formatted = Self::format(&kind, &source, &target, &data);

        Self {
            id,
            kind,
            source,
            target,
            timestamp: timestamp_ms,
            data,
            formatted,
        }
    }

    fn format(
        kind: &SignalType,
        source: &str,
        target: &str,
        data: &HashMap<String, Value>,
    ) -> String {
        let mut line = format!("{} {} \u{2192} {} : {}", kind.glyph(), source, target, kind);
        if !data.is_empty() {
            let mut pairs: Vec<_> = data.iter().map(|(k, v)| format!("{k}={v}")).collect();
            pairs.sort();
            line.push_str(", ");
            line.push_str(&pairs.join(", "));
        }
        line
    }
}

/// Broadcast-backed fan-out to every subscriber: the audit store (which
/// appends synchronously), websocket rooms, and metrics counters.
///
/// Cloning the bus clones the sender; every clone publishes to the same set
/// of subscribers.
#[derive(Clone)]
pub struct SignalBus {
    sender: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a signal. Returns the number of live subscribers that
    /// received it; `0` is not an error, it just means nobody was listening.
    pub fn publish(&self, signal: Signal) -> usize {
        self.sender.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }

    #[test]
    fn webhook_event_types_map_to_their_fixed_wire_names() {
        assert_eq!(SignalType::PrOpened.as_str(), "pr.opened");
        assert_eq!(SignalType::IssueOpened.as_str(), "issue.opened");
        assert_eq!(SignalType::PaymentReceived.as_str(), "payment.received");
    }

    #[test]
    fn formatted_line_matches_glyph_source_target_type() {
        let signal = Signal::new(SignalType::RouteRequest, "OS", "FND", 1_000, HashMap::new());
        assert_eq!(signal.formatted, "> OS \u{2192} FND : route.request");
    }

    #[test]
    fn id_is_deterministic_for_identical_inputs() {
        let a = Signal::new(
            SignalType::WebhookReceived,
            "github",
            "AI",
            42,
            data(&[("repo", "router")]),
        );
        let b = Signal::new(
            SignalType::WebhookReceived,
            "github",
            "AI",
            42,
            data(&[("repo", "router")]),
        );
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn id_differs_when_body_differs() {
        let a = Signal::new(SignalType::WebhookReceived, "github", "AI", 42, data(&[("repo", "a")]));
        let b = Signal::new(SignalType::WebhookReceived, "github", "AI", 42, data(&[("repo", "b")]));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn serialization_round_trips() {
        let signal = Signal::new(
            SignalType::RouteComplete,
            "OS",
            "FND",
            123,
            data(&[("status", "200")]),
        );
        let encoded = serde_json::to_string(&signal).unwrap();
        let decoded: Signal = serde_json::from_str(&encoded).unwrap();
        assert_eq!(signal.id, decoded.id);
        assert_eq!(signal.formatted, decoded.formatted);
    }

    #[tokio::test]
    async fn bus_fans_out_to_every_subscriber() {
        let bus = SignalBus::new(16);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.publish(Signal::new(SignalType::NodeOnline, "node-1", "ALL", 0, HashMap::new()));
        assert_eq!(a.recv().await.unwrap().kind, SignalType::NodeOnline);
        assert_eq!(b.recv().await.unwrap().kind, SignalType::NodeOnline);
    }
}
