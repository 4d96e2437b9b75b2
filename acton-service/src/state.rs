//! Application state: every shared component a handler might need, built
//! once at startup and cloned cheaply (every field is an `Arc`, a handle, or
//! already `Clone`) into each request's `State<AppState>` extractor.

use std::sync::{Arc, RwLock};

use acton_reactive::prelude::{ActonApp, AgentRuntime};

use crate::agents::rate_limit::RateLimiter;
use crate::audit::AuditStore;
use crate::auth::{ApiKeyGenerator, ApiKeyStore, JwtGenerator, PasswordHasher, RefreshTokenStorage, UserStore};
use crate::classifier::Router as ClassifierRouter;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::middleware::jwt::JwtAuth;
use crate::proxy::{HttpCaller, OriginPools, Proxy};
use crate::registry::{self, RegistryHandle};
use crate::session::SessionStore;
use crate::signal::SignalBus;
use crate::webhook::{ProviderRegistry, WebhookQueue, WebhookSecrets};
use crate::websocket::RoomRegistry;

/// Everything a handler needs, shared behind cheap-to-clone handles.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: RegistryHandle,
    pub classifier: Arc<ClassifierRouter>,
    pub dispatcher: Arc<Dispatcher<HttpCaller>>,
    pub bus: SignalBus,
    pub audit: Arc<AuditStore>,
    pub webhook_providers: Arc<ProviderRegistry>,
    pub webhook_secrets: Arc<WebhookSecrets>,
    pub webhook_queue: Arc<WebhookQueue>,
    pub rate_limiter: RateLimiter,
    pub sessions: Arc<SessionStore>,
    pub api_keys: Arc<RwLock<ApiKeyStore>>,
    pub api_key_generator: Arc<ApiKeyGenerator>,
    pub refresh_tokens: Arc<RefreshTokenStorage>,
    pub users: Arc<UserStore>,
    pub password_hasher: Arc<PasswordHasher>,
    pub jwt_generator: Arc<JwtGenerator>,
    pub jwt_auth: JwtAuth,
    pub proxy: Arc<Proxy>,
    pub rooms: RoomRegistry,
}

impl AppState {
    /// Build the full application state from loaded configuration. Returns
    /// the agent runtime alongside state so the caller can shut it down
    /// gracefully; `AppState` itself only holds handles into it.
    pub async fn build(config: Config) -> Result<(Self, AgentRuntime)> {
        let registry_source = std::fs::read_to_string(&config.registry.path).map_err(|e| {
            crate::error::Error::Internal(format!(
                "failed to read registry file {}: {e}",
                config.registry.path.display()
            ))
        })?;
        let registry = registry::parse(&registry_source)?;
        let registry = RegistryHandle::new(registry);

        let bus = SignalBus::new(config.audit.bus_capacity);
        let audit = Arc::new(AuditStore::new(config.audit.retention_days));
        audit.clone().spawn_bus_listener(&bus);
        audit.clone().spawn_retention_sweep(config.audit.cleanup_interval_hours);

        let rooms = RoomRegistry::spawn(&config.websocket, &bus);

        let webhook_providers = Arc::new(ProviderRegistry::default());
        let webhook_secrets = Arc::new(WebhookSecrets {
            by_provider: config.webhooks.secrets.clone(),
        });
        let webhook_queue = Arc::new(WebhookQueue::new(config.webhooks.queue_capacity, bus.clone()));

        let mut runtime = ActonApp::launch();
        let rate_limiter = RateLimiter::spawn(
            &mut runtime,
            u64::from(config.rate_limit.default_per_minute),
            config.rate_limit.window_secs * 1000,
        )
        .await
        .map_err(|e| crate::error::Error::Internal(format!("failed to start rate limiter: {e}")))?;

        let sessions = Arc::new(SessionStore::spawn(&config.session));

        let proxy = Arc::new(Proxy::new(
            OriginPools {
                primary: config.origins.primary.clone(),
                storage: config.origins.storage.clone(),
                agents: config.origins.agents.clone(),
            },
            config.origins.internal_token.clone(),
        )?);

        let dispatcher = Arc::new(Dispatcher::new(HttpCaller::new()?));

        let state = Self {
            classifier: Arc::new(ClassifierRouter::new()),
            dispatcher,
            bus,
            audit,
            webhook_providers,
            webhook_secrets,
            webhook_queue,
            rate_limiter,
            sessions,
            api_keys: Arc::new(RwLock::new(ApiKeyStore::new())),
            api_key_generator: Arc::new(ApiKeyGenerator::new(config.auth.api_keys.clone())),
            refresh_tokens: Arc::new(RefreshTokenStorage::new()),
            users: Arc::new(UserStore::new()),
            password_hasher: Arc::new(PasswordHasher::new(config.auth.password.clone())),
            jwt_generator: Arc::new(JwtGenerator::new(&config.jwt)),
            jwt_auth: JwtAuth::new(&config.jwt),
            proxy,
            rooms,
            registry,
            config: Arc::new(config),
        };

        Ok((state, runtime))
    }
}

/// Shared fixture for handler-level tests: a fully wired [`AppState`] backed
/// by a minimal on-disk registry, so handler tests exercise the real
/// startup path (`AppState::build`) rather than hand-assembling state.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    const MINIMAL_REGISTRY: &str = r#"
default_org = "AI"

[orgs.AI]
name = "Artificial Intelligence"
status = "active"
[orgs.AI.services.router]
endpoint = "http://ai-router.internal:9102"
default = true

[orgs.FND]
name = "Foundation"
status = "active"
[orgs.FND.services.salesforce]
endpoint = "http://fnd-salesforce.internal:9103"
provider = "salesforce"
default = true
"#;

    /// Build a test `AppState` plus the temp directory backing its registry
    /// file (kept alive by the caller for the state's lifetime) and the
    /// agent runtime (shut down explicitly, or left to drop -- acceptable
    /// in tests, unlike in `main`).
    pub(crate) async fn test_state() -> (AppState, AgentRuntime, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry_path = dir.path().join("registry.toml");
        std::fs::write(&registry_path, MINIMAL_REGISTRY).expect("write registry fixture");

        let mut config = Config::default();
        config.registry.path = registry_path;

        let (state, runtime) = AppState::build(config).await.expect("build test AppState");
        (state, runtime, dir)
    }
}
