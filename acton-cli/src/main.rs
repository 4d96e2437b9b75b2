use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;
mod error;
mod utils;

use error::CliError;

/// acton - the edge-to-mesh request router
#[derive(Parser)]
#[command(name = "acton")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a TOML config file (ACTON_-prefixed env vars always apply on top)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway and serve traffic until a shutdown signal arrives
    Serve,
    /// Classify free text into an (org, service) target
    Route {
        /// The text to classify
        text: String,
    },
    /// Dispatch a payload directly at a known (org, service), bypassing classification
    Dispatch {
        /// Organization code, e.g. AI
        #[arg(long)]
        org: String,
        /// Service name within the organization, e.g. router
        #[arg(long)]
        service: String,
        /// JSON payload to send
        payload: String,
    },
    /// Inspect the signal feed of a running gateway
    Signals {
        #[command(subcommand)]
        command: SignalsCommands,
    },
    /// Check a running gateway's health and status endpoints
    Health {
        /// Base URL of the running gateway
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },
}

#[derive(Subcommand)]
enum SignalsCommands {
    /// Poll and print new signals as they arrive
    Tail {
        /// Base URL of the running gateway
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
        /// API key for the x-api-key header (protected route)
        #[arg(long, env = "ACTON_API_KEY")]
        api_key: Option<String>,
        /// Only print signals at or after this epoch-millisecond timestamp
        #[arg(long)]
        since: Option<i64>,
        /// Seconds to wait between polls
        #[arg(long, default_value_t = 2)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            std::process::exit(err.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Serve => commands::serve::execute(cli.config.as_deref()).await,
        Commands::Route { text } => commands::route::execute(cli.config.as_deref(), &text).await,
        Commands::Dispatch { org, service, payload } => {
            commands::dispatch::execute(cli.config.as_deref(), &org, &service, &payload).await
        }
        Commands::Signals {
            command: SignalsCommands::Tail { url, api_key, since, interval_secs },
        } => commands::signals::tail(&url, api_key.as_deref(), since, interval_secs).await,
        Commands::Health { url } => commands::health::execute(&url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_subcommand_parses_its_positional_text() {
        let cli = Cli::try_parse_from(["acton", "route", "Sync Salesforce contacts"]).unwrap();
        match cli.command {
            Commands::Route { text } => assert_eq!(text, "Sync Salesforce contacts"),
            _ => panic!("expected Route"),
        }
    }

    #[test]
    fn dispatch_subcommand_requires_org_and_service() {
        let err = Cli::try_parse_from(["acton", "dispatch", "{}"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn dispatch_subcommand_parses_with_flags() {
        let cli = Cli::try_parse_from(["acton", "dispatch", "--org", "AI", "--service", "router", "{}"]).unwrap();
        match cli.command {
            Commands::Dispatch { org, service, payload } => {
                assert_eq!(org, "AI");
                assert_eq!(service, "router");
                assert_eq!(payload, "{}");
            }
            _ => panic!("expected Dispatch"),
        }
    }

    #[test]
    fn health_defaults_to_local_gateway() {
        let cli = Cli::try_parse_from(["acton", "health"]).unwrap();
        match cli.command {
            Commands::Health { url } => assert_eq!(url, "http://127.0.0.1:8080"),
            _ => panic!("expected Health"),
        }
    }
}
