//! The rate-limit actor: a single writer owns every identity's counter, so
//! concurrent requests never race on an increment (§5). Callers are plain
//! Tokio tasks, not agents themselves, so replies travel over a `oneshot`
//! channel embedded in the request message rather than `reply_envelope()`
//! (which expects the sender to be another agent in the runtime).

use std::collections::HashMap;
use std::time::Duration;

use acton_reactive::prelude::*;
use tokio::sync::oneshot;

/// Fixed-window counter per identity. A window resets once its start is more
/// than `window_ms` in the past, rather than ticking on a timer — this keeps
/// the actor stateless between requests and needs no background task.
#[derive(Debug, Default)]
pub struct RateLimitState {
    buckets: HashMap<String, Bucket>,
    limit: u64,
    window_ms: i64,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    window_start_ms: i64,
    count: u64,
}

/// What the gateway does with a rate-limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed { remaining: u64 },
    Denied { retry_after_secs: u64 },
}

#[derive(Clone, Debug)]
struct CheckAndIncrement {
    identity: String,
    now_ms: i64,
    reply: std::sync::Arc<std::sync::Mutex<Option<oneshot::Sender<RateLimitOutcome>>>>,
}

impl RateLimitState {
    fn check_and_increment(&mut self, identity: &str, now_ms: i64) -> RateLimitOutcome {
        let bucket = self.buckets.entry(identity.to_string()).or_insert(Bucket {
            window_start_ms: now_ms,
            count: 0,
        });

        if now_ms - bucket.window_start_ms >= self.window_ms {
            bucket.window_start_ms = now_ms;
            bucket.count = 0;
        }

        bucket.count += 1;

        if bucket.count > self.limit {
            let elapsed_ms = now_ms - bucket.window_start_ms;
            let remaining_ms = (self.window_ms - elapsed_ms).max(0);
            let retry_after_secs = (remaining_ms as u64).div_ceil(1000).max(1);
            RateLimitOutcome::Denied { retry_after_secs }
        } else {
            RateLimitOutcome::Allowed {
                remaining: self.limit - bucket.count,
            }
        }
    }
}

/// Handle shared across the gateway's request-handling tasks. Holds the
/// `AgentHandle` (write path) plus the configured round-trip timeout budget
/// used to decide when to fail open (§4.1, §5).
#[derive(Clone)]
pub struct RateLimiter {
    handle: AgentHandle,
    round_trip_timeout: Duration,
}

impl RateLimiter {
    /// Spawn the rate-limit actor with a fixed window (milliseconds) and a
    /// per-window request limit.
    pub async fn spawn(runtime: &mut AgentRuntime, limit: u64, window_ms: i64) -> anyhow::Result<Self> {
        let mut agent = runtime.new_agent::<RateLimitState>();
        agent.model.limit = limit;
        agent.model.window_ms = window_ms;

        agent.mutate_on::<CheckAndIncrement>(|agent, envelope| {
            let msg = envelope.message();
            let outcome = agent.model.check_and_increment(&msg.identity, msg.now_ms);
            if let Ok(mut slot) = msg.reply.lock() {
                if let Some(tx) = slot.take() {
                    let _ = tx.send(outcome);
                }
            }
            AgentReply::immediate()
        });

        agent.after_start(|_agent| {
            tracing::info!("rate-limit actor started");
            AgentReply::immediate()
        });

        agent.before_stop(|agent| {
            let identities = agent.model.buckets.len();
            tracing::info!(identities, "rate-limit actor stopping");
            AgentReply::immediate()
        });

        let handle = agent.start().await;

        Ok(Self {
            handle,
            round_trip_timeout: Duration::from_secs(5),
        })
    }

    /// Check-and-increment the counter for `identity`. `None` means the
    /// actor didn't answer within the round-trip budget; the gateway treats
    /// that as fail-open and emits `rate_limit.unavailable` (§4.1).
    pub async fn check(&self, identity: &str, now_ms: i64) -> Option<RateLimitOutcome> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(CheckAndIncrement {
                identity: identity.to_string(),
                now_ms,
                reply: std::sync::Arc::new(std::sync::Mutex::new(Some(tx))),
            })
            .await;

        tokio::time::timeout(self.round_trip_timeout, rx)
            .await
            .ok()
            .and_then(|r| r.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(limit: u64, window_ms: i64) -> RateLimitState {
        RateLimitState {
            buckets: HashMap::new(),
            limit,
            window_ms,
        }
    }

    #[test]
    fn allows_up_to_the_limit_then_denies() {
        let mut s = state(3, 60_000);
        assert_eq!(
            s.check_and_increment("key", 0),
            RateLimitOutcome::Allowed { remaining: 2 }
        );
        assert_eq!(
            s.check_and_increment("key", 10),
            RateLimitOutcome::Allowed { remaining: 1 }
        );
        assert_eq!(
            s.check_and_increment("key", 20),
            RateLimitOutcome::Allowed { remaining: 0 }
        );
        match s.check_and_increment("key", 30) {
            RateLimitOutcome::Denied { retry_after_secs } => assert!(retry_after_secs <= 60),
            other => panic!("expected Denied, got {other:?}"),
        }
    }

    #[test]
    fn window_resets_after_expiry() {
        let mut s = state(1, 1_000);
        assert!(matches!(
            s.check_and_increment("key", 0),
            RateLimitOutcome::Allowed { .. }
        ));
        assert!(matches!(
            s.check_and_increment("key", 500),
            RateLimitOutcome::Denied { .. }
        ));
        assert!(matches!(
            s.check_and_increment("key", 1_500),
            RateLimitOutcome::Allowed { .. }
        ));
    }

    #[test]
    fn distinct_identities_have_independent_buckets() {
        let mut s = state(1, 60_000);
        assert!(matches!(
            s.check_and_increment("a", 0),
            RateLimitOutcome::Allowed { .. }
        ));
        assert!(matches!(
            s.check_and_increment("b", 0),
            RateLimitOutcome::Allowed { .. }
        ));
    }

    #[tokio::test]
    async fn actor_round_trip_enforces_the_same_window() {
        let mut runtime = ActonApp::launch();
        let limiter = RateLimiter::spawn(&mut runtime, 2, 60_000).await.unwrap();

        assert!(matches!(
            limiter.check("req", 0).await,
            Some(RateLimitOutcome::Allowed { .. })
        ));
        assert!(matches!(
            limiter.check("req", 0).await,
            Some(RateLimitOutcome::Allowed { .. })
        ));
        assert!(matches!(
            limiter.check("req", 0).await,
            Some(RateLimitOutcome::Denied { .. })
        ));

        runtime.shutdown_all().await.ok();
    }
}
