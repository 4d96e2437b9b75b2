//! Layered application configuration.
//!
//! Loaded with `figment`: defaults, then an optional TOML file, then
//! `ACTON_`-prefixed environment overrides (`Env::prefixed("ACTON_").split("_")`),
//! matching the nested-struct convention the rest of the crate expects.

use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration, assembled once at startup and shared behind
/// an `Arc` in [`crate::state::AppState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub origins: OriginsConfig,
    #[serde(default)]
    pub audit: crate::audit::AuditConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub auth: crate::auth::config::AuthConfig,
}

impl Config {
    /// Load configuration from an optional TOML file plus environment
    /// overrides. A missing file is not an error -- defaults apply.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        let config: Config = figment
            .merge(Env::prefixed("ACTON_").split("_"))
            .extract()?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            timeouts: TimeoutConfig::default(),
            registry: RegistryConfig::default(),
            webhooks: WebhookConfig::default(),
            origins: OriginsConfig::default(),
            audit: crate::audit::AuditConfig::default(),
            session: SessionConfig::default(),
            websocket: WebSocketConfig::default(),
            auth: crate::auth::config::AuthConfig::default(),
        }
    }
}

/// Identity and network settings for this instance of the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "acton-router".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// HMAC-SHA-256 JWT settings (§4.1 narrows this gateway to HS256 only --
/// no RSA/EC key files to manage at the edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Shared secret, read from `ACTON_JWT_SECRET` in production; never
    /// logged.
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    /// Access token lifetime, capped at 1 hour per §4.1.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            issuer: None,
            audience: None,
            access_token_ttl_secs: default_access_token_ttl(),
        }
    }
}

fn default_jwt_secret() -> String {
    "dev-only-insecure-secret-change-in-production".to_string()
}
fn default_access_token_ttl() -> i64 {
    3600
}

/// Defaults for the single-writer rate-limit actor (§3/§5). Per-API-key
/// overrides come from the key record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_per_minute")]
    pub default_per_minute: u32,
    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_per_minute: default_rate_limit_per_minute(),
            window_secs: default_rate_limit_window_secs(),
        }
    }
}

fn default_rate_limit_per_minute() -> u32 {
    1000
}
fn default_rate_limit_window_secs() -> i64 {
    60
}

/// CORS allow-list (§4.1): origin must match or the response falls back
/// to the first allow-listed origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// Static response headers applied to every response (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub hsts: bool,
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age_secs: u64,
    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,
    #[serde(default = "default_true")]
    pub hsts_preload: bool,
    #[serde(default = "default_true")]
    pub x_content_type_options: bool,
    #[serde(default = "default_frame_options")]
    pub x_frame_options: String,
    #[serde(default = "default_true")]
    pub x_xss_protection: bool,
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
    #[serde(default = "default_permissions_policy")]
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: true,
            hsts_max_age_secs: default_hsts_max_age(),
            hsts_include_subdomains: true,
            hsts_preload: true,
            x_content_type_options: true,
            x_frame_options: default_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
            permissions_policy: default_permissions_policy(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_hsts_max_age() -> u64 {
    31_536_000
}
fn default_frame_options() -> String {
    "DENY".to_string()
}
fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}
fn default_permissions_policy() -> Option<String> {
    Some("camera=(), microphone=(), geolocation=()".to_string())
}

/// Connect/total timeouts and the hard ingress body-size cap (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_ws_frame_limit_bytes")]
    pub ws_frame_limit_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            body_limit_bytes: default_body_limit_bytes(),
            ws_frame_limit_bytes: default_ws_frame_limit_bytes(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_ws_frame_limit_bytes() -> usize {
    64 * 1024
}

/// Where to load the orgs/services/rules/categories registry file from
/// (§6). A missing file at startup is a configuration error, not a
/// silent empty registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("registry.toml")
}

/// Per-provider webhook shared secrets (§4.4). Absent entries mean
/// verification is skipped (dev-only mode) for that provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub secrets: std::collections::HashMap<String, String>,
    #[serde(default = "default_webhook_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_webhook_queue_capacity() -> usize {
    1024
}

/// Base URLs for the three backend origin pools a request can be
/// forwarded to (§6) plus the internal service token attached to every
/// forwarded call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginsConfig {
    #[serde(default = "default_primary_url")]
    pub primary: String,
    #[serde(default = "default_storage_url")]
    pub storage: String,
    #[serde(default = "default_agents_url")]
    pub agents: String,
    #[serde(default = "default_internal_token")]
    pub internal_token: String,
}

impl Default for OriginsConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_url(),
            storage: default_storage_url(),
            agents: default_agents_url(),
            internal_token: default_internal_token(),
        }
    }
}

fn default_primary_url() -> String {
    "http://localhost:9001".to_string()
}
fn default_storage_url() -> String {
    "http://localhost:9002".to_string()
}
fn default_agents_url() -> String {
    "http://localhost:9003".to_string()
}
fn default_internal_token() -> String {
    "dev-only-internal-token".to_string()
}

/// Session lifetime defaults (§3). Refresh tokens outlive access tokens;
/// the session itself is deleted on logout or lazily at first access
/// after `expires_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: i64,
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_session_ttl_secs() -> i64 {
    3600
}
fn default_refresh_ttl_secs() -> i64 {
    604_800
}
fn default_cookie_name() -> String {
    "acton_session".to_string()
}

/// WebSocket room whitelist and per-subscriber channel sizing (§4.1/§5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_rooms")]
    pub rooms: Vec<String>,
    #[serde(default = "default_subscriber_channel_capacity")]
    pub subscriber_channel_capacity: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            rooms: default_rooms(),
            subscriber_channel_capacity: default_subscriber_channel_capacity(),
        }
    }
}

fn default_rooms() -> Vec<String> {
    vec![
        "signals".to_string(),
        "metrics".to_string(),
        "alerts".to_string(),
        "chat".to_string(),
        "status".to_string(),
    ]
}
fn default_subscriber_channel_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.rate_limit.default_per_minute, 1000);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn websocket_rooms_match_the_spec_whitelist() {
        let config = Config::default();
        assert_eq!(
            config.websocket.rooms,
            vec!["signals", "metrics", "alerts", "chat", "status"]
        );
    }

    #[test]
    fn defaults_are_internally_consistent() {
        let config = Config::default();
        assert_eq!(config.service.name, "acton-router");
        assert_eq!(config.timeouts.ws_frame_limit_bytes, 64 * 1024);
        assert_eq!(config.timeouts.body_limit_bytes, 10 * 1024 * 1024);
    }
}
