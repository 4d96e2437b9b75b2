//! BLAKE3 hash chain for audit record integrity.
//!
//! Computes a BLAKE3 hash over each record's content plus the previous
//! record's hash, forming an ordered chain. Modifying a past record
//! invalidates every subsequent hash.
//!
//! `AuditChain` is intentionally not shared directly across tasks — it is
//! owned exclusively by the audit store, which appends sequentially under
//! a single lock (see `audit_store.rs`).

use super::event::AuditRecord;

/// Running chain state: previous hash plus sequence number.
pub struct AuditChain {
    previous_hash: Option<String>,
    sequence: u64,
}

impl AuditChain {
    /// Start a new chain from genesis (no previous hash).
    pub fn new() -> Self {
        Self {
            previous_hash: None,
            sequence: 0,
        }
    }

    /// Resume an existing chain from the last known tip, e.g. after loading
    /// the latest persisted record on startup.
    pub fn resume(previous_hash: String, sequence: u64) -> Self {
        Self {
            previous_hash: Some(previous_hash),
            sequence,
        }
    }

    /// Seal a record: assigns its sequence and previous_hash, computes its
    /// hash, and advances the chain tip.
    pub fn seal(&mut self, mut record: AuditRecord) -> AuditRecord {
        self.sequence += 1;
        record.sequence = self.sequence;
        record.previous_hash = self.previous_hash.clone();

        let hash = Self::compute_hash(&record);
        record.hash = Some(hash.clone());
        self.previous_hash = Some(hash);

        record
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    /// The hash covers sequence, previous_hash, signal id, timestamp, type,
    /// source, target, actor, action, resource, and outcome.
    fn compute_hash(record: &AuditRecord) -> String {
        let mut hasher = blake3::Hasher::new();

        hasher.update(record.sequence.to_le_bytes().as_ref());
        if let Some(ref prev) = record.previous_hash {
            hasher.update(prev.as_bytes());
        }

        hasher.update(record.signal.id.as_bytes());
        hasher.update(record.timestamp_ms.to_le_bytes().as_ref());
        hasher.update(record.signal.kind.as_str().as_bytes());
        hasher.update(record.signal.source.as_bytes());
        hasher.update(record.signal.target.as_bytes());
        hasher.update(record.actor.as_bytes());
        hasher.update(record.action.as_bytes());
        hasher.update(record.resource.as_bytes());
        hasher.update(&[record.outcome as u8]);

        hasher.finalize().to_hex().to_string()
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify a chain of records (must be in sequence order). Returns the
/// sequence number of the first broken link on failure.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), ChainVerificationError> {
    let mut expected_prev: Option<String> = None;

    for record in records {
        if record.previous_hash != expected_prev {
            return Err(ChainVerificationError {
                sequence: record.sequence,
                expected_previous_hash: expected_prev,
                actual_previous_hash: record.previous_hash.clone(),
            });
        }

        let recomputed = AuditChain::compute_hash(record);
        if record.hash.as_deref() != Some(recomputed.as_str()) {
            return Err(ChainVerificationError {
                sequence: record.sequence,
                expected_previous_hash: expected_prev,
                actual_previous_hash: record.previous_hash.clone(),
            });
        }

        expected_prev = record.hash.clone();
    }

    Ok(())
}

#[derive(Debug)]
pub struct ChainVerificationError {
    pub sequence: u64,
    pub expected_previous_hash: Option<String>,
    pub actual_previous_hash: Option<String>,
}

impl std::fmt::Display for ChainVerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "audit chain broken at sequence {}: expected previous_hash {:?}, got {:?}",
            self.sequence, self.expected_previous_hash, self.actual_previous_hash
        )
    }
}

impl std::error::Error for ChainVerificationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::AuditOutcome;
    use crate::signal::{Signal, SignalType};
    use std::collections::HashMap;

    fn make_record() -> AuditRecord {
        let signal = Signal::new(SignalType::RouteComplete, "OS", "FND", 1, HashMap::new());
        AuditRecord::new(signal, "user-1", "route", "FND/salesforce", AuditOutcome::Success)
    }

    #[test]
    fn seal_sets_sequence_and_hash_with_no_previous() {
        let mut chain = AuditChain::new();
        let sealed = chain.seal(make_record());
        assert_eq!(sealed.sequence, 1);
        assert!(sealed.hash.is_some());
        assert!(sealed.previous_hash.is_none());
    }

    #[test]
    fn chain_links_successive_records() {
        let mut chain = AuditChain::new();
        let r1 = chain.seal(make_record());
        let r2 = chain.seal(make_record());
        assert_eq!(r2.sequence, 2);
        assert_eq!(r2.previous_hash, r1.hash);
    }

    #[test]
    fn resume_continues_the_chain() {
        let mut chain = AuditChain::new();
        let r1 = chain.seal(make_record());
        let tip = r1.hash.clone().unwrap();

        let mut resumed = AuditChain::resume(tip.clone(), 1);
        let r2 = resumed.seal(make_record());
        assert_eq!(r2.sequence, 2);
        assert_eq!(r2.previous_hash, Some(tip));
    }

    #[test]
    fn verify_chain_detects_tampering() {
        let mut chain = AuditChain::new();
        let mut records: Vec<AuditRecord> = (0..5).map(|_| chain.seal(make_record())).collect();
        records[2].hash = Some("tampered".to_string());
        assert!(verify_chain(&records).is_err());
    }

    #[test]
    fn verify_chain_accepts_empty_and_untampered() {
        assert!(verify_chain(&[]).is_ok());

        let mut chain = AuditChain::new();
        let records: Vec<AuditRecord> = (0..5).map(|_| chain.seal(make_record())).collect();
        assert!(verify_chain(&records).is_ok());
    }
}
