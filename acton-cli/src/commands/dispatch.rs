use colored::Colorize;

use acton_service::dispatcher::Outcome;
use acton_service::prelude::{AppState, Config};

use crate::error::CliError;

/// Dispatch a payload straight at a known `(org, service)` pair, bypassing
/// classification entirely -- the same path `Dispatcher::dispatch_to` is
/// built for.
pub async fn execute(config_path: Option<&str>, org: &str, service: &str, payload: &str) -> Result<(), CliError> {
    let payload: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| CliError::Runtime(format!("payload must be valid JSON: {e}")))?;

    let config = Config::load(config_path)?;
    let (state, runtime) = AppState::build(config).await?;

    let request_id = uuid::Uuid::new_v4().to_string();
    let registry = state.registry.load();
    let (result, signal) = state
        .dispatcher
        .dispatch_to(&registry, &request_id, org, service, &payload)
        .await;
    state.bus.publish(signal);

    runtime.shutdown_all().await.ok();

    match result.outcome {
        Outcome::Success => {
            println!(
                "{} {} {}/{} in {}ms",
                "✓".green().bold(),
                result.status.to_string().green(),
                org,
                service,
                result.latency_ms
            );
            if let Some(body) = &result.response_body {
                println!("{body}");
            }
            Ok(())
        }
        Outcome::Failure => {
            println!(
                "{} {} {}/{} in {}ms",
                "✗".red().bold(),
                result.status.to_string().red(),
                org,
                service,
                result.latency_ms
            );
            let reason = result.error_reason.unwrap_or_else(|| "dispatch failed".to_string());
            Err(CliError::Runtime(reason))
        }
    }
}
