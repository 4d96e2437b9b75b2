//! Server-side session map (§3/§5).
//!
//! Reads are lock-free: every request takes a read guard on a shared
//! `RwLock<HashMap>` and returns immediately. Writes (create, refresh,
//! delete) are serialized through a bounded channel to a single background
//! task, mirroring the hybrid fast-read/serialized-write pattern the
//! JWT-revocation store and the rate-limit actor both use — one writer per
//! process means inserts and expirations can never race each other.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, RwLock};
use uuid::Uuid;

use crate::config::SessionConfig;

/// A server-side session record (§3). `refresh_token_hash` lets the store
/// validate a refresh redemption without holding the raw token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub created_ms: i64,
    pub expires_ms: i64,
    pub refresh_token_hash: String,
}

impl Session {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_ms
    }
}

enum Command {
    Create { session: Session },
    Delete { session_id: String, reply: oneshot::Sender<()> },
    Touch { session_id: String, new_expires_ms: i64, reply: oneshot::Sender<()> },
}

/// Handle shared across handlers. Cloning is cheap — it's an `Arc` over the
/// shared map plus a sender into the write actor.
#[derive(Clone)]
pub struct SessionStore {
    map: Arc<RwLock<HashMap<String, Session>>>,
    tx: mpsc::Sender<Command>,
    ttl_secs: i64,
}

impl SessionStore {
    pub fn spawn(config: &SessionConfig) -> Self {
        let map: Arc<RwLock<HashMap<String, Session>>> = Arc::new(RwLock::new(HashMap::new()));
        let (tx, mut rx) = mpsc::channel::<Command>(256);

        let writer_map = map.clone();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Create { session } => {
                        writer_map.write().await.insert(session.session_id.clone(), session);
                    }
                    Command::Delete { session_id, reply } => {
                        writer_map.write().await.remove(&session_id);
                        let _ = reply.send(());
                    }
                    Command::Touch { session_id, new_expires_ms, reply } => {
                        if let Some(session) = writer_map.write().await.get_mut(&session_id) {
                            session.expires_ms = new_expires_ms;
                        }
                        let _ = reply.send(());
                    }
                }
            }
        });

        Self {
            map,
            tx,
            ttl_secs: config.ttl_secs,
        }
    }

    /// Create a new session for `user_id`, keyed by `refresh_token_hash`.
    pub async fn create(&self, user_id: String, refresh_token_hash: String, now_ms: i64) -> Session {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            created_ms: now_ms,
            expires_ms: now_ms + self.ttl_secs * 1000,
            refresh_token_hash,
        };
        let _ = self.tx.send(Command::Create { session: session.clone() }).await;
        session
    }

    /// Lock-free read. Lazily treats an expired session as absent without
    /// issuing a write — the write actor cleans it up at the next `touch`
    /// or an explicit `delete`.
    pub async fn get(&self, session_id: &str, now_ms: i64) -> Option<Session> {
        let map = self.map.read().await;
        map.get(session_id)
            .filter(|s| !s.is_expired(now_ms))
            .cloned()
    }

    pub async fn touch(&self, session_id: &str, now_ms: i64) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Touch {
                session_id: session_id.to_string(),
                new_expires_ms: now_ms + self.ttl_secs * 1000,
                reply: reply_tx,
            })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    pub async fn delete(&self, session_id: &str) {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(Command::Delete { session_id: session_id.to_string(), reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }
    }

    pub async fn len(&self) -> usize {
        self.map.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            ttl_secs: 3600,
            refresh_ttl_secs: 604_800,
            cookie_name: "acton_session".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = SessionStore::spawn(&config());
        let session = store.create("user-1".to_string(), "hash".to_string(), 0).await;
        tokio::task::yield_now().await;

        let fetched = store.get(&session.session_id, 0).await.unwrap();
        assert_eq!(fetched.user_id, "user-1");
    }

    #[tokio::test]
    async fn expired_session_reads_as_absent() {
        let store = SessionStore::spawn(&config());
        let session = store.create("user-1".to_string(), "hash".to_string(), 0).await;
        tokio::task::yield_now().await;

        assert!(store.get(&session.session_id, 10_000_000).await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_session() {
        let store = SessionStore::spawn(&config());
        let session = store.create("user-1".to_string(), "hash".to_string(), 0).await;
        store.delete(&session.session_id).await;

        assert!(store.get(&session.session_id, 0).await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
