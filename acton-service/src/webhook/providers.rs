//! Per-provider signature verification and payload parsing.

use std::collections::HashMap;

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::signal::{Signal, SignalType};

type HmacSha256 = Hmac<Sha256>;

/// Replay window shared by every provider that signs a timestamp (Stripe,
/// Slack): reject anything whose clock skew exceeds five minutes (§4.4).
const REPLAY_WINDOW_SECS: i64 = 300;

/// Whether a provider's signature was actually checked. `Skipped` only
/// happens when no secret is configured for that provider (dev-only, §4.4);
/// it is never returned once a secret exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Skipped,
}

/// A named webhook source. Handlers are stateless; the secret is supplied
/// per-call from configuration so rotating it needs no redeploy of code.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this provider's fingerprint (a distinguishing header) is
    /// present. Bypassed entirely when the caller supplies `provider_hint`.
    fn can_handle(&self, headers: &HeaderMap) -> bool;

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: Option<&str>,
        now_ms: i64,
    ) -> Result<VerifyOutcome>;

    fn parse(&self, body: &[u8], headers: &HeaderMap, now_ms: i64) -> Result<Signal>;
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    let mut out = String::with_capacity(64);
    for byte in mac.finalize().into_bytes() {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Map a repository's owner prefix to an organization code. Unknown sources
/// default to `OS` (§4.4).
fn org_for_repo(full_name: &str) -> &'static str {
    if full_name.starts_with("BlackRoad-AI/") {
        "AI"
    } else {
        "OS"
    }
}

fn data(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// ---------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------

pub struct GitHub;

impl Provider for GitHub {
    fn name(&self) -> &'static str {
        "github"
    }

    fn can_handle(&self, headers: &HeaderMap) -> bool {
        headers.contains_key("x-github-event") || headers.contains_key("x-hub-signature-256")
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: Option<&str>,
        _now_ms: i64,
    ) -> Result<VerifyOutcome> {
        let Some(secret) = secret else {
            return Ok(VerifyOutcome::Skipped);
        };
        let provided = header_str(headers, "x-hub-signature-256").ok_or(Error::InvalidSignature)?;
        let provided = provided.strip_prefix("sha256=").ok_or(Error::InvalidSignature)?;
        let expected = hmac_hex(secret, body);
        if constant_time_eq(&expected, provided) {
            Ok(VerifyOutcome::Verified)
        } else {
            Err(Error::InvalidSignature)
        }
    }

    fn parse(&self, body: &[u8], headers: &HeaderMap, now_ms: i64) -> Result<Signal> {
        let json: Value = serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))?;
        let event = header_str(headers, "x-github-event").unwrap_or("event");
        let repo = json
            .get("repository")
            .and_then(|r| r.get("full_name").or_else(|| r.get("name")))
            .and_then(Value::as_str)
            .unwrap_or("unknown/unknown");
        let action = json.get("action").and_then(Value::as_str).unwrap_or("");

        let (kind, label) = match (event, action) {
            ("pull_request", "opened") => (SignalType::PrOpened, "pr.opened"),
            ("issues", "opened") => (SignalType::IssueOpened, "issue.opened"),
            _ => (SignalType::WebhookReceived, event),
        };

        Ok(Signal::new(
            kind,
            "github",
            org_for_repo(repo),
            now_ms,
            data(&[
                ("event_type", Value::String(label.to_string())),
                ("repository", Value::String(repo.to_string())),
                ("action", Value::String(action.to_string())),
            ]),
        ))
    }
}

// ---------------------------------------------------------------------
// Stripe
// ---------------------------------------------------------------------

pub struct Stripe;

fn parse_stripe_header(value: &str) -> Option<(i64, &str)> {
    let mut ts = None;
    let mut v1 = None;
    for part in value.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => ts = v.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => v1 = Some(v),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

impl Provider for Stripe {
    fn name(&self) -> &'static str {
        "stripe"
    }

    fn can_handle(&self, headers: &HeaderMap) -> bool {
        headers.contains_key("stripe-signature")
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: Option<&str>,
        now_ms: i64,
    ) -> Result<VerifyOutcome> {
        let Some(secret) = secret else {
            return Ok(VerifyOutcome::Skipped);
        };
        let header = header_str(headers, "stripe-signature").ok_or(Error::InvalidSignature)?;
        let (ts, v1) = parse_stripe_header(header).ok_or(Error::InvalidSignature)?;

        let now_secs = now_ms / 1000;
        if (now_secs - ts).abs() > REPLAY_WINDOW_SECS {
            return Err(Error::TimestampExpired);
        }

        let mut signed = format!("{ts}.").into_bytes();
        signed.extend_from_slice(body);
        let expected = hmac_hex(secret, &signed);

        if constant_time_eq(&expected, v1) {
            Ok(VerifyOutcome::Verified)
        } else {
            Err(Error::InvalidSignature)
        }
    }

    fn parse(&self, body: &[u8], _headers: &HeaderMap, now_ms: i64) -> Result<Signal> {
        let json: Value = serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))?;
        let event_type = json.get("type").and_then(Value::as_str).unwrap_or("event").to_string();
        let kind = if event_type.starts_with("payment") || event_type.starts_with("charge") {
            SignalType::PaymentReceived
        } else {
            SignalType::WebhookReceived
        };
        Ok(Signal::new(
            kind,
            "stripe",
            "AI",
            now_ms,
            data(&[("event_type", Value::String(event_type))]),
        ))
    }
}

// ---------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------

pub struct Slack;

impl Provider for Slack {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn can_handle(&self, headers: &HeaderMap) -> bool {
        headers.contains_key("x-slack-signature")
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: Option<&str>,
        now_ms: i64,
    ) -> Result<VerifyOutcome> {
        let Some(secret) = secret else {
            return Ok(VerifyOutcome::Skipped);
        };
        let provided = header_str(headers, "x-slack-signature").ok_or(Error::InvalidSignature)?;
        let provided = provided.strip_prefix("v0=").ok_or(Error::InvalidSignature)?;
        let ts: i64 = header_str(headers, "x-slack-request-timestamp")
            .and_then(|v| v.parse().ok())
            .ok_or(Error::InvalidSignature)?;

        let now_secs = now_ms / 1000;
        if (now_secs - ts).abs() > REPLAY_WINDOW_SECS {
            return Err(Error::TimestampExpired);
        }

        let mut signed = format!("v0:{ts}:").into_bytes();
        signed.extend_from_slice(body);
        let expected = hmac_hex(secret, &signed);

        if constant_time_eq(&expected, provided) {
            Ok(VerifyOutcome::Verified)
        } else {
            Err(Error::InvalidSignature)
        }
    }

    fn parse(&self, body: &[u8], _headers: &HeaderMap, now_ms: i64) -> Result<Signal> {
        let json: Value = serde_json::from_slice(body).map_err(|e| Error::InvalidBody(e.to_string()))?;
        let event_type = json.get("type").and_then(Value::as_str).unwrap_or("event").to_string();
        Ok(Signal::new(
            SignalType::WebhookReceived,
            "slack",
            "OS",
            now_ms,
            data(&[("event_type", Value::String(event_type))]),
        ))
    }
}

/// Shared shape for the lighter-weight providers: a single signature header,
/// optionally HMAC-SHA256 of the raw body, no replay window.
struct MinimalHmacProvider {
    name: &'static str,
    signature_header: &'static str,
    fingerprint_header: &'static str,
    default_org: &'static str,
}

impl Provider for MinimalHmacProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn can_handle(&self, headers: &HeaderMap) -> bool {
        headers.contains_key(self.fingerprint_header) || headers.contains_key(self.signature_header)
    }

    fn verify(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        secret: Option<&str>,
        _now_ms: i64,
    ) -> Result<VerifyOutcome> {
        let Some(secret) = secret else {
            return Ok(VerifyOutcome::Skipped);
        };
        let provided = header_str(headers, self.signature_header).ok_or(Error::InvalidSignature)?;
        let expected = hmac_hex(secret, body);
        if constant_time_eq(&expected, provided) {
            Ok(VerifyOutcome::Verified)
        } else {
            Err(Error::InvalidSignature)
        }
    }

    fn parse(&self, body: &[u8], _headers: &HeaderMap, now_ms: i64) -> Result<Signal> {
        let json: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let event_type = json
            .get("type")
            .or_else(|| json.get("event"))
            .and_then(Value::as_str)
            .unwrap_or("event")
            .to_string();
        Ok(Signal::new(
            SignalType::WebhookReceived,
            self.name,
            self.default_org,
            now_ms,
            data(&[("event_type", Value::String(event_type))]),
        ))
    }
}

pub fn salesforce() -> Box<dyn Provider> {
    Box::new(MinimalHmacProvider {
        name: "salesforce",
        signature_header: "x-salesforce-signature",
        fingerprint_header: "x-salesforce-signature",
        default_org: "FND",
    })
}

pub fn cloudflare() -> Box<dyn Provider> {
    Box::new(MinimalHmacProvider {
        name: "cloudflare",
        signature_header: "cf-webhook-auth",
        fingerprint_header: "cf-webhook-auth",
        default_org: "OS",
    })
}

pub fn google() -> Box<dyn Provider> {
    Box::new(MinimalHmacProvider {
        name: "google",
        signature_header: "x-goog-signature",
        fingerprint_header: "x-goog-resource-state",
        default_org: "OS",
    })
}

pub fn figma() -> Box<dyn Provider> {
    Box::new(MinimalHmacProvider {
        name: "figma",
        signature_header: "x-figma-signature",
        fingerprint_header: "x-figma-signature",
        default_org: "OS",
    })
}
