//! Tracing initialization: JSON output in production, pretty-printed in
//! development, both filtered by `RUST_LOG`/`[service].log_level` (§2).

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Initialize the global tracing subscriber. Call once at process startup,
/// before anything else logs.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.service.log_level.clone()));

    if config.service.environment == "production" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!(service = %config.service.name, environment = %config.service.environment, "tracing initialized");

    Ok(())
}
