//! Room fan-out: one `tokio::sync::broadcast` channel per configured room
//! name, fed by a background task that republishes bus signals into
//! `"signals"` and mirrors a subset into `"alerts"` / `"status"` (§4.5).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::WebSocketConfig;
use crate::signal::{Signal, SignalBus, SignalType};

/// Rooms a signal of this type is mirrored into, beyond `"signals"` (every
/// signal lands there). Most signal types mirror nowhere else.
fn mirror_rooms(kind: SignalType) -> &'static [&'static str] {
    match kind {
        SignalType::BudgetAlert | SignalType::RateLimited | SignalType::RateLimitUnavailable => {
            &["alerts"]
        }
        SignalType::NodeOnline | SignalType::NodeOffline => &["status"],
        _ => &[],
    }
}

/// The set of rooms a websocket client may subscribe to, each backed by its
/// own broadcast channel so a slow "chat" subscriber can't lag "signals".
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<HashMap<String, broadcast::Sender<Arc<Signal>>>>,
}

impl RoomRegistry {
    /// Build the registry from configuration and spawn the background task
    /// that mirrors every published signal into its rooms.
    pub fn spawn(config: &WebSocketConfig, bus: &SignalBus) -> Self {
        let mut rooms = HashMap::new();
        for name in &config.rooms {
            let (tx, _rx) = broadcast::channel(config.subscriber_channel_capacity);
            rooms.insert(name.clone(), tx);
        }
        let registry = Self {
            rooms: Arc::new(rooms),
        };

        let mut signals = bus.subscribe();
        let feeder = registry.clone();
        tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => feeder.publish(signal),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        registry
    }

    fn publish(&self, signal: Signal) {
        let signal = Arc::new(signal);
        if let Some(tx) = self.rooms.get("signals") {
            let _ = tx.send(signal.clone());
        }
        for room in mirror_rooms(signal.kind) {
            if let Some(tx) = self.rooms.get(*room) {
                let _ = tx.send(signal.clone());
            }
        }
    }

    /// Subscribe to a room by name. Returns `None` if the room isn't in the
    /// configured whitelist -- callers should reject the subscription
    /// request rather than silently dropping it.
    pub fn subscribe(&self, room: &str) -> Option<broadcast::Receiver<Arc<Signal>>> {
        self.rooms.get(room).map(|tx| tx.subscribe())
    }

    pub fn is_whitelisted(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }
}
