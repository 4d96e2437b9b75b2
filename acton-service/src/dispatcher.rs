//! The dispatcher: given a classification, resolve an endpoint and invoke
//! it through a narrow `Call` capability so tests can substitute a mock
//! (§4.3). The dispatcher performs exactly one attempt; retries belong to
//! a higher-level failover component outside this crate's scope.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::Classification;
use crate::registry::Registry;
use crate::signal::{Signal, SignalType};

/// Bound on the dispatch history ring buffer used for `stats()`.
const HISTORY_CAP: usize = 1000;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// The narrow capability the dispatcher invokes an endpoint through. Real
/// code implements this with an HTTP client (`proxy::HttpCaller`); tests
/// implement it with a fixed or programmable response.
#[async_trait]
pub trait Call: Send + Sync {
    async fn call(&self, endpoint: &str, payload: &Value) -> CallOutcome;
}

/// The raw result of one invocation, before it's folded into a
/// `DispatchResult`.
pub struct CallOutcome {
    pub status: u16,
    pub body: Option<Value>,
    pub error: Option<String>,
}

/// The result of one dispatch attempt (§3 `DispatchResult`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub request_id: String,
    pub org: String,
    pub service: String,
    pub outcome: Outcome,
    pub status: u16,
    pub latency_ms: u64,
    pub response_body: Option<Value>,
    pub error_reason: Option<String>,
}

impl DispatchResult {
    fn is_success(status: u16) -> bool {
        (200..300).contains(&status)
    }
}

/// Roll up history into on-demand statistics (§4.3 Statistics).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchStats {
    pub total: usize,
    pub success_rate: f64,
    pub by_org: HashMap<String, usize>,
    pub by_service: HashMap<String, usize>,
    pub average_latency_ms: f64,
}

struct HistoryEntry {
    org: String,
    service: String,
    outcome: Outcome,
    latency_ms: u64,
}

/// Resolves endpoints against a registry snapshot, invokes them through a
/// `Call` capability, and emits exactly one signal per dispatch.
pub struct Dispatcher<C: Call> {
    caller: C,
    history: Mutex<Vec<HistoryEntry>>,
}

impl<C: Call> Dispatcher<C> {
    pub fn new(caller: C) -> Self {
        Self {
            caller,
            history: Mutex::new(Vec::new()),
        }
    }

    /// 3-level endpoint resolution (§4.3): named service, else the org's
    /// default service, else the first declared service.
    pub fn resolve<'a>(
        registry: &'a Registry,
        org: &str,
        service: &str,
    ) -> Result<&'a str, &'static str> {
        let organization = registry.organization(org).ok_or("no_service")?;

        if let Some(svc) = organization.services.get(service) {
            return Ok(svc.endpoint.as_str());
        }
        if let Some(svc) = organization.default_service() {
            return Ok(svc.endpoint.as_str());
        }
        organization
            .services
            .values()
            .next()
            .map(|s| s.endpoint.as_str())
            .ok_or("no_service")
    }

    /// Dispatch a classification: resolve its target, invoke it, record
    /// history, and build the signal. Caller is responsible for publishing
    /// the returned signal on the bus and appending it to the audit store
    /// (ordering guarantee §5: the signal must hit the bus before the HTTP
    /// response returns).
    pub async fn dispatch(
        &self,
        registry: &Registry,
        request_id: &str,
        classification: &Classification,
        payload: &Value,
    ) -> (DispatchResult, Signal) {
        self.dispatch_to(
            registry,
            request_id,
            classification.org(),
            classification.service(),
            payload,
        )
        .await
    }

    /// Dispatch an explicit `(org, service)` pair, bypassing classification
    /// (used by the CLI's `dispatch` subcommand and by the external
    /// failover layer retrying with a different target).
    pub async fn dispatch_to(
        &self,
        registry: &Registry,
        request_id: &str,
        org: &str,
        service: &str,
        payload: &Value,
    ) -> (DispatchResult, Signal) {
        let endpoint = match Self::resolve(registry, org, service) {
            Ok(endpoint) => endpoint,
            Err(reason) => {
                let result = DispatchResult {
                    request_id: request_id.to_string(),
                    org: org.to_string(),
                    service: service.to_string(),
                    outcome: Outcome::Failure,
                    status: 404,
                    latency_ms: 0,
                    response_body: None,
                    error_reason: Some(reason.to_string()),
                };
                let signal = self.record_and_signal(&result, reason);
                return (result, signal);
            }
        };

        let start = Instant::now();
        let call_outcome = tokio::time::timeout(TOTAL_TIMEOUT, self.caller.call(endpoint, payload))
            .await
            .unwrap_or(CallOutcome {
                status: 504,
                body: None,
                error: Some("origin timed out".to_string()),
            });
        let latency_ms = start.elapsed().as_millis() as u64;

        let outcome = if DispatchResult::is_success(call_outcome.status) {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        let result = DispatchResult {
            request_id: request_id.to_string(),
            org: org.to_string(),
            service: service.to_string(),
            outcome,
            status: call_outcome.status,
            latency_ms,
            response_body: call_outcome.body,
            error_reason: call_outcome.error.clone(),
        };

        let signal = self.record_and_signal(&result, call_outcome.error.as_deref().unwrap_or(""));
        (result, signal)
    }

    fn record_and_signal(&self, result: &DispatchResult, reason: &str) -> Signal {
        {
            let mut history = self.history.lock().expect("dispatch history poisoned");
            history.push(HistoryEntry {
                org: result.org.clone(),
                service: result.service.clone(),
                outcome: result.outcome.clone(),
                latency_ms: result.latency_ms,
            });
            if history.len() > HISTORY_CAP {
                let drop = history.len() - HISTORY_CAP / 2;
                history.drain(0..drop);
            }
        }

        let mut data = HashMap::new();
        data.insert("request_id".to_string(), Value::String(result.request_id.clone()));
        data.insert("status".to_string(), Value::Number(result.status.into()));
        data.insert("latency_ms".to_string(), Value::Number(result.latency_ms.into()));
        if result.outcome == Outcome::Failure && !reason.is_empty() {
            data.insert("reason".to_string(), Value::String(reason.to_string()));
        }

        let kind = if result.outcome == Outcome::Success {
            SignalType::RouteComplete
        } else {
            SignalType::RouteFailed
        };

        Signal::new(
            kind,
            "gateway",
            format!("{}/{}", result.org, result.service),
            chrono::Utc::now().timestamp_millis(),
            data,
        )
    }

    pub fn stats(&self) -> DispatchStats {
        let history = self.history.lock().expect("dispatch history poisoned");
        let total = history.len();
        if total == 0 {
            return DispatchStats::default();
        }

        let mut by_org = HashMap::new();
        let mut by_service = HashMap::new();
        let mut successes = 0usize;
        let mut latency_sum = 0u64;
        let mut latency_count = 0u64;

        for entry in history.iter() {
            *by_org.entry(entry.org.clone()).or_insert(0) += 1;
            *by_service.entry(entry.service.clone()).or_insert(0) += 1;
            if entry.outcome == Outcome::Success {
                successes += 1;
                latency_sum += entry.latency_ms;
                latency_count += 1;
            }
        }

        DispatchStats {
            total,
            success_rate: successes as f64 / total as f64,
            by_org,
            by_service,
            average_latency_ms: if latency_count > 0 {
                latency_sum as f64 / latency_count as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    const DOC: &str = r#"
default_org = "AI"

[orgs.FND]
name = "Foundation"
status = "active"
[orgs.FND.services.salesforce]
endpoint = "http://fnd-salesforce.internal"
default = true
[orgs.FND.services.other]
endpoint = "http://fnd-other.internal"

[orgs.EMPTY]
name = "Nothing registered"
status = "planned"
[orgs.EMPTY.services.placeholder]
endpoint = "http://placeholder.internal"

[orgs.NODEFAULT]
name = "No default marked"
status = "active"
[orgs.NODEFAULT.services.zeta]
endpoint = "http://zeta.internal"
[orgs.NODEFAULT.services.alpha]
endpoint = "http://alpha.internal"
"#;

    struct FixedCaller {
        status: u16,
    }

    #[async_trait]
    impl Call for FixedCaller {
        async fn call(&self, _endpoint: &str, _payload: &Value) -> CallOutcome {
            CallOutcome {
                status: self.status,
                body: Some(Value::String("ok".to_string())),
                error: None,
            }
        }
    }

    fn registry() -> registry::Registry {
        registry::parse(DOC).unwrap()
    }

    #[test]
    fn resolve_prefers_named_service() {
        let r = registry();
        let endpoint = Dispatcher::<FixedCaller>::resolve(&r, "FND", "other").unwrap();
        assert_eq!(endpoint, "http://fnd-other.internal");
    }

    #[test]
    fn resolve_falls_back_to_default_service() {
        let r = registry();
        let endpoint = Dispatcher::<FixedCaller>::resolve(&r, "FND", "missing").unwrap();
        assert_eq!(endpoint, "http://fnd-salesforce.internal");
    }

    #[test]
    fn resolve_falls_back_to_first_declared_service_when_none_is_default() {
        let r = registry();
        let endpoint = Dispatcher::<FixedCaller>::resolve(&r, "NODEFAULT", "missing").unwrap();
        assert_eq!(endpoint, "http://zeta.internal");
    }

    #[test]
    fn resolve_fails_for_unknown_org() {
        let r = registry();
        assert!(Dispatcher::<FixedCaller>::resolve(&r, "ZZZ", "x").is_err());
    }

    #[tokio::test]
    async fn success_status_yields_success_outcome_and_route_complete() {
        let r = registry();
        let dispatcher = Dispatcher::new(FixedCaller { status: 200 });
        let (result, signal) = dispatcher
            .dispatch_to(&r, "req-1", "FND", "salesforce", &Value::Null)
            .await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(signal.kind, SignalType::RouteComplete);
    }

    #[tokio::test]
    async fn non_2xx_status_yields_failure_outcome_and_route_failed() {
        let r = registry();
        let dispatcher = Dispatcher::new(FixedCaller { status: 500 });
        let (result, signal) = dispatcher
            .dispatch_to(&r, "req-1", "FND", "salesforce", &Value::Null)
            .await;
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(signal.kind, SignalType::RouteFailed);
    }

    #[tokio::test]
    async fn outcome_matches_status_class_invariant() {
        let r = registry();
        for status in [200u16, 201, 299, 300, 404, 500] {
            let dispatcher = Dispatcher::new(FixedCaller { status });
            let (result, _) = dispatcher
                .dispatch_to(&r, "req", "FND", "salesforce", &Value::Null)
                .await;
            assert_eq!(result.outcome == Outcome::Success, (200..300).contains(&status));
        }
    }

    #[tokio::test]
    async fn no_service_for_org_with_no_default_and_no_match_still_resolves_first() {
        let r = registry();
        let dispatcher = Dispatcher::new(FixedCaller { status: 200 });
        let (result, _) = dispatcher
            .dispatch_to(&r, "EMPTY", "nonexistent", &Value::Null)
            .await;
        assert_eq!(result.outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn unknown_org_dispatches_a_no_service_failure() {
        let r = registry();
        let dispatcher = Dispatcher::new(FixedCaller { status: 200 });
        let (result, signal) = dispatcher
            .dispatch_to(&r, "req", "ZZZ", "whatever", &Value::Null)
            .await;
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(result.status, 404);
        assert_eq!(signal.kind, SignalType::RouteFailed);
    }

    #[tokio::test]
    async fn stats_aggregate_over_history() {
        let r = registry();
        let dispatcher = Dispatcher::new(FixedCaller { status: 200 });
        for _ in 0..3 {
            dispatcher
                .dispatch_to(&r, "req", "FND", "salesforce", &Value::Null)
                .await;
        }
        let stats = dispatcher.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.by_org.get("FND"), Some(&3));
    }
}
