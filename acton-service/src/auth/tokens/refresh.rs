//! Refresh token storage: an opaque random token, stored server-side keyed
//! by its SHA-256 hash (§3). The raw token is the only thing a client ever
//! holds; the store never needs to decrypt or decode anything, only compare
//! hashes.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenData {
    pub user_id: String,
    pub expires_ms: i64,
    pub created_ms: i64,
}

/// Generates an opaque refresh token and its lookup hash.
pub fn generate() -> (String, String) {
    let raw = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let hash = hash_token(&raw);
    (raw, hash)
}

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

/// In-memory refresh-token store, keyed by hash. A real deployment backs
/// this with the `sessions` table (§6); this is the in-process form used by
/// the CLI/tests and as the single-instance default.
#[derive(Default)]
pub struct RefreshTokenStorage {
    by_hash: Mutex<HashMap<String, RefreshTokenData>>,
}

impl RefreshTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, hash: String, data: RefreshTokenData) {
        self.by_hash.lock().expect("refresh token store poisoned").insert(hash, data);
    }

    /// Redeem a raw refresh token: look it up, reject if expired, and
    /// rotate it out (single use — §4.1 reuse detection means a second
    /// redemption of the same token always fails).
    pub fn redeem(&self, raw_token: &str, now_ms: i64) -> Result<RefreshTokenData> {
        let hash = hash_token(raw_token);
        let mut store = self.by_hash.lock().expect("refresh token store poisoned");
        let data = store
            .remove(&hash)
            .ok_or(Error::InvalidCredentials)?;
        if now_ms >= data.expires_ms {
            return Err(Error::InvalidCredentials);
        }
        Ok(data)
    }

    pub fn revoke(&self, raw_token: &str) {
        let hash = hash_token(raw_token);
        self.by_hash.lock().expect("refresh token store poisoned").remove(&hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeem_succeeds_once_then_fails() {
        let storage = RefreshTokenStorage::new();
        let (raw, hash) = generate();
        storage.store(hash, RefreshTokenData { user_id: "u1".to_string(), expires_ms: 1_000, created_ms: 0 });

        assert!(storage.redeem(&raw, 500).is_ok());
        assert!(storage.redeem(&raw, 500).is_err());
    }

    #[test]
    fn redeem_rejects_expired_tokens() {
        let storage = RefreshTokenStorage::new();
        let (raw, hash) = generate();
        storage.store(hash, RefreshTokenData { user_id: "u1".to_string(), expires_ms: 100, created_ms: 0 });

        assert!(storage.redeem(&raw, 200).is_err());
    }
}
