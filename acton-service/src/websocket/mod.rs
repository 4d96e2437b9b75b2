//! WebSocket support: connections upgrade from HTTP on the same port and
//! subscribe to one of a fixed set of rooms, each fanning out signals from
//! the bus in real time (§4.5).

mod rooms;

pub use rooms::RoomRegistry;

// Re-export axum WebSocket types for convenience.
pub use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
