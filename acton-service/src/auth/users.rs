//! In-memory user directory backing `/v1/auth/{login,register,refresh}`
//! (§3, §6). A real deployment backs this with the `users` table; this store
//! is the in-process form used by the CLI/tests and as the single-instance
//! default, following the same pattern as [`super::api_keys::ApiKeyStore`].

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub created_ms: i64,
}

/// Keyed by email for login lookup; `id` is the stable identifier carried
/// in JWT `sub` claims as `"user:<id>"`.
#[derive(Default)]
pub struct UserStore {
    by_email: Mutex<HashMap<String, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new user, rejecting a duplicate email.
    pub fn register(&self, email: String, name: String, password_hash: String, now_ms: i64) -> Result<User> {
        let mut users = self.by_email.lock().expect("user store poisoned");
        if users.contains_key(&email) {
            return Err(Error::InvalidRequest("email already registered".to_string()));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            name,
            password_hash,
            role: "user".to_string(),
            created_ms: now_ms,
        };
        users.insert(email, user.clone());
        Ok(user)
    }

    pub fn by_email(&self, email: &str) -> Option<User> {
        self.by_email.lock().expect("user store poisoned").get(email).cloned()
    }

    /// Linear scan by stable id, needed when only `user_id` is on hand (the
    /// refresh-token flow). Fine at this store's scale; a table-backed store
    /// would index on `id` directly.
    pub fn by_id(&self, id: &str) -> Option<User> {
        self.by_email
            .lock()
            .expect("user store poisoned")
            .values()
            .find(|u| u.id == id)
            .cloned()
    }

    /// Persist an upgraded password hash (legacy sha256 -> pbkdf2) in place.
    pub fn update_password_hash(&self, email: &str, password_hash: String) {
        if let Some(user) = self.by_email.lock().expect("user store poisoned").get_mut(email) {
            user.password_hash = password_hash;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_by_email() {
        let store = UserStore::new();
        let user = store.register("a@example.com".to_string(), "A".to_string(), "hash".to_string(), 0).unwrap();
        assert_eq!(store.by_email("a@example.com").unwrap().id, user.id);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let store = UserStore::new();
        store.register("a@example.com".to_string(), "A".to_string(), "hash".to_string(), 0).unwrap();
        assert!(store.register("a@example.com".to_string(), "B".to_string(), "hash2".to_string(), 0).is_err());
    }

    #[test]
    fn lookup_by_id_finds_the_registered_user() {
        let store = UserStore::new();
        let user = store.register("a@example.com".to_string(), "A".to_string(), "hash".to_string(), 0).unwrap();
        assert_eq!(store.by_id(&user.id).unwrap().email, "a@example.com");
        assert!(store.by_id("nonexistent").is_none());
    }
}
