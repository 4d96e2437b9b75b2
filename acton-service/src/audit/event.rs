//! The audit record: a signal plus the index tuple used to query it, linked
//! into the hash chain by [`super::chain::AuditChain`].

use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// A `Signal` plus `(actor, action, resource, outcome, timestamp)`. Records
/// are never updated — only appended and later trimmed by retention policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub signal: Signal,
    pub actor: String,
    pub action: String,
    pub resource: String,
    pub outcome: AuditOutcome,
    pub timestamp_ms: i64,

    /// BLAKE3 hash of this record, set by `AuditChain::seal`.
    pub hash: Option<String>,
    /// Hash of the previous record in the chain.
    pub previous_hash: Option<String>,
    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl AuditRecord {
    pub fn new(
        signal: Signal,
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        let timestamp_ms = signal.timestamp;
        Self {
            signal,
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            outcome,
            timestamp_ms,
            hash: None,
            previous_hash: None,
            sequence: 0,
        }
    }
}
