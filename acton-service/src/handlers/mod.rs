//! Wire-level HTTP handlers (§6). Each submodule owns one family of
//! endpoints; request/response shapes live next to the handler that uses
//! them rather than in a shared DTO module.

pub mod auth;
pub mod health;
pub mod proxy;
pub mod route;
pub mod signals;
pub mod webhooks;
pub mod websocket;
