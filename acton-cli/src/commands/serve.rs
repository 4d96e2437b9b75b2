use colored::Colorize;

use acton_service::prelude::*;

use crate::error::CliError;

/// Start the gateway in this process and serve until SIGINT/SIGTERM.
pub async fn execute(config_path: Option<&str>) -> Result<(), CliError> {
    let config = Config::load(config_path)?;
    init_tracing(&config)?;

    println!("{}", "Starting the edge-to-mesh gateway...".bold());

    let (state, runtime) = AppState::build(config).await?;
    let app = service_builder::build_router(state.clone());
    let server = Server::new((*state.config).clone());

    server
        .serve(app)
        .await
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.shutdown_all().await.ok();
    Ok(())
}
