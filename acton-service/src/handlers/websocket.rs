//! `GET /v1/ws` (§4.5/§6): upgrade to a websocket and subscribe to one or
//! more whitelisted rooms, fanning signals out as JSON text frames. The
//! token travels as a query parameter since browsers cannot set a custom
//! header on the upgrade request.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::Response,
};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use crate::error::{Error, Result};
use crate::middleware::jwt::Claims;
use crate::signal::Signal;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
    pub rooms: Option<String>,
}

fn default_rooms() -> Vec<String> {
    vec!["signals".to_string()]
}

pub async fn upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let token = params
        .token
        .ok_or_else(|| Error::Unauthorized("missing token query parameter".to_string()))?;
    let claims = state.jwt_auth.validate_token(&token)?;

    let rooms: Vec<String> = params
        .rooms
        .as_deref()
        .map(|raw| raw.split(',').map(|r| r.trim().to_string()).filter(|r| !r.is_empty()).collect())
        .filter(|rooms: &Vec<String>| !rooms.is_empty())
        .unwrap_or_else(default_rooms);

    for room in &rooms {
        if !state.rooms.is_whitelisted(room) {
            return Err(Error::Forbidden(format!("room '{room}' is not whitelisted")));
        }
    }

    let capacity = state.config.websocket.subscriber_channel_capacity;
    let max_frame = state.config.timeouts.ws_frame_limit_bytes;

    Ok(ws
        .max_frame_size(max_frame)
        .on_upgrade(move |socket| handle_socket(socket, state, rooms, claims, capacity)))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, rooms: Vec<String>, claims: Claims, capacity: usize) {
    tracing::info!(sub = %claims.sub, rooms = ?rooms, "websocket connected");

    let (tx, mut rx) = mpsc::channel::<Arc<Signal>>(capacity);
    let mut forwarders = Vec::new();
    for room in &rooms {
        let Some(mut receiver) = state.rooms.subscribe(room) else {
            continue;
        };
        let tx = tx.clone();
        forwarders.push(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(signal) => {
                        // A full channel means this subscriber is too slow;
                        // drop the connection rather than buffer unbounded
                        // (§5 backpressure).
                        if tx.try_send(signal).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }
    drop(tx);

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(signal) => {
                        let text = serde_json::to_string(&*signal).unwrap_or_default();
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    tracing::info!(sub = %claims.sub, "websocket disconnected");
}
