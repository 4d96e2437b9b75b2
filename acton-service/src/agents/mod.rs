//! Agent-based components for acton-service.
//!
//! Built on [`acton_reactive`], the only agent this crate runs in production
//! is the rate-limit actor: a single writer per process that serializes
//! every increment so concurrent requests never race (§5). Everything else
//! in the gateway is a plain Tokio task.

mod rate_limit;

pub mod prelude {
    pub use acton_reactive::prelude::*;

    pub use super::rate_limit::{RateLimitOutcome, RateLimiter};
}

pub use rate_limit::{RateLimitOutcome, RateLimiter};
