//! # acton-service
//!
//! The edge-to-mesh request router: a single gateway that authenticates
//! inbound traffic, classifies free-text requests into an `(org, service)`
//! target, dispatches them to the resolved backend, ingests signed webhooks
//! from external providers, and fans every event out through an in-process
//! signal bus backed by a tamper-evident audit log.
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load(None)?;
//!     init_tracing(&config)?;
//!
//!     let (state, runtime) = AppState::build(config).await?;
//!     let app = service_builder::build_router(state.clone());
//!
//!     server::Server::new((*state.config).clone()).serve(app).await?;
//!     runtime.shutdown_all().await.ok();
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod audit;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod service_builder;
pub mod session;
pub mod signal;
pub mod sql_guard;
pub mod state;
pub mod webhook;
pub mod websocket;

/// Everything a binary embedding this crate typically needs.
pub mod prelude {
    pub use crate::audit::{AuditConfig, AuditOutcome, AuditQuery, AuditRecord, AuditStore};
    pub use crate::auth::{ApiKey, ApiKeyGenerator, ApiKeyStore, PasswordHasher, TokenPair, User, UserStore};
    pub use crate::classifier::{Classification, Router as ClassifierRouter};
    pub use crate::config::Config;
    pub use crate::dispatcher::{Dispatcher, DispatchResult, DispatchStats, Outcome};
    pub use crate::error::{Error, Result};
    pub use crate::middleware::jwt::{Claims, JwtAuth};
    pub use crate::observability::init_tracing;
    pub use crate::proxy::Proxy;
    pub use crate::registry::{Registry, RegistryHandle};
    pub use crate::server::Server;
    pub use crate::service_builder;
    pub use crate::signal::{Signal, SignalBus, SignalType};
    pub use crate::state::AppState;
    pub use crate::webhook::{IntakeAck, ProviderRegistry, WebhookQueue, WebhookSecrets};
}
