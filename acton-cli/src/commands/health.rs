use colored::Colorize;
use serde::Deserialize;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    service: String,
    environment: String,
    registry_orgs: usize,
    audit_records: usize,
}

/// Hit a running gateway's public `/health` and `/v1/status` endpoints.
pub async fn execute(url: &str) -> Result<(), CliError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .map_err(|e| CliError::Runtime(format!("failed to build HTTP client: {e}")))?;

    let base_url = url.trim_end_matches('/');

    let health_url = format!("{base_url}/health");
    print!("Health endpoint ({health_url})... ");
    let response = client
        .get(&health_url)
        .send()
        .await
        .map_err(|e| CliError::Runtime(format!("request to {health_url} failed: {e}")))?;

    if !response.status().is_success() {
        println!("{}", "FAILED".red().bold());
        return Err(CliError::Runtime(format!("gateway returned {}", response.status())));
    }
    println!("{}", "OK".green().bold());

    let status_url = format!("{base_url}/v1/status");
    let status: StatusResponse = client
        .get(&status_url)
        .send()
        .await
        .map_err(|e| CliError::Runtime(format!("request to {status_url} failed: {e}")))?
        .json()
        .await
        .map_err(|e| CliError::Runtime(format!("failed to parse status response: {e}")))?;

    println!("  service:        {}", status.service);
    println!("  environment:    {}", status.environment);
    println!("  registry orgs:  {}", status.registry_orgs);
    println!("  audit records:  {}", status.audit_records);

    Ok(())
}
