use colored::Colorize;

use acton_service::signal::Signal;

use crate::error::CliError;

/// Poll a running gateway's `/v1/signals` and print each new one as it
/// arrives, oldest first. There's no long-lived connection here -- the
/// gateway's websocket room fan-out is for browser clients; this is a
/// plain polling loop against the same audited history the rooms mirror.
pub async fn tail(url: &str, api_key: Option<&str>, since: Option<i64>, interval_secs: u64) -> Result<(), CliError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| CliError::Runtime(format!("failed to build HTTP client: {e}")))?;

    let base_url = url.trim_end_matches('/');
    let mut cursor = since;
    warn_if_no_credential(api_key);

    println!("{}", format!("Tailing signals from {base_url} (Ctrl+C to stop)...").bold());

    loop {
        let mut request = client.get(format!("{base_url}/v1/signals"));
        if let Some(cursor) = cursor {
            request = request.query(&[("since", cursor)]);
        }
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CliError::Runtime(format!("request to {base_url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CliError::Runtime(format!(
                "gateway returned {} for /v1/signals",
                response.status()
            )));
        }

        let signals: Vec<Signal> = response
            .json()
            .await
            .map_err(|e| CliError::Runtime(format!("failed to parse signal feed: {e}")))?;

        for signal in &signals {
            println!("{}", signal.formatted);
            cursor = Some(cursor.map_or(signal.timestamp, |c| c.max(signal.timestamp)) + 1);
        }

        tokio::time::sleep(std::time::Duration::from_secs(interval_secs)).await;
    }
}

fn warn_if_no_credential(api_key: Option<&str>) {
    if api_key.is_none() {
        eprintln!(
            "{} no --api-key given; /v1/signals is a protected route and will 401 without one",
            "⚠".yellow().bold()
        );
    }
}
