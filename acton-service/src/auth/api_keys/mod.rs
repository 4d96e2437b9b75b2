//! API key authentication (§3/§4.1).
//!
//! Unlike passwords, API keys are high-entropy secrets generated by us, not
//! chosen by a human, so a slow hash buys nothing — a lookup needs to be
//! fast and a SHA-256 digest of the raw key is already infeasible to invert
//! or brute-force at the entropy this module generates (§9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::config::ApiKeyConfig;
use crate::error::{Error, Result};

/// An API key record as persisted (§3). `key_hash` is the lookup key; the
/// raw key is shown to the caller exactly once, at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_minute: Option<u32>,
    pub expires_ms: Option<i64>,
    pub created_ms: i64,
}

impl ApiKey {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_ms.map(|exp| now_ms >= exp).unwrap_or(false)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Generates and hashes API keys. The raw key has the shape
/// `{prefix}_{random}`; only `key_hash` (SHA-256 of the raw key) is ever
/// stored.
#[derive(Clone)]
pub struct ApiKeyGenerator {
    config: ApiKeyConfig,
}

impl Default for ApiKeyGenerator {
    fn default() -> Self {
        Self::new(ApiKeyConfig::default())
    }
}

impl ApiKeyGenerator {
    pub fn new(config: ApiKeyConfig) -> Self {
        Self { config }
    }

    /// Generate a new raw key and its hash. The raw key must be shown to the
    /// caller now — it cannot be recovered from `key_hash` afterward.
    pub fn generate(&self) -> (String, String) {
        let mut random = String::new();
        while random.len() < self.config.random_len {
            random.push_str(&Uuid::new_v4().simple().to_string());
        }
        random.truncate(self.config.random_len);

        let raw = format!("{}_{}", self.config.prefix, random);
        let hash = Self::hash(&raw);
        (raw, hash)
    }

    pub fn hash(raw_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_key.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// In-memory API key lookup by hash, keyed for O(1) verification on every
/// request. A real deployment backs this with the `api_keys` table (§6);
/// this store is the in-process cache read on the hot path.
#[derive(Default)]
pub struct ApiKeyStore {
    by_hash: HashMap<String, ApiKey>,
}

impl ApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ApiKey) {
        self.by_hash.insert(key.key_hash.clone(), key);
    }

    /// Resolve a raw incoming key to its record, rejecting unknown or
    /// expired keys.
    pub fn verify(&self, raw_key: &str, now_ms: i64) -> Result<&ApiKey> {
        let hash = ApiKeyGenerator::hash(raw_key);
        let key = self
            .by_hash
            .get(&hash)
            .ok_or(Error::InvalidCredentials)?;
        if key.is_expired(now_ms) {
            return Err(Error::InvalidCredentials);
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_verifies_against_its_own_hash() {
        let generator = ApiKeyGenerator::default();
        let (raw, hash) = generator.generate();
        assert!(raw.starts_with("ak_"));
        assert_eq!(ApiKeyGenerator::hash(&raw), hash);
    }

    #[test]
    fn store_rejects_unknown_keys() {
        let store = ApiKeyStore::new();
        assert!(store.verify("nonexistent", 0).is_err());
    }

    #[test]
    fn store_rejects_expired_keys() {
        let mut store = ApiKeyStore::new();
        let generator = ApiKeyGenerator::default();
        let (raw, hash) = generator.generate();
        store.insert(ApiKey {
            id: "1".to_string(),
            user_id: "u1".to_string(),
            key_hash: hash,
            scopes: vec![],
            rate_limit_per_minute: None,
            expires_ms: Some(100),
            created_ms: 0,
        });
        assert!(store.verify(&raw, 200).is_err());
        assert!(store.verify(&raw, 50).is_ok());
    }
}
