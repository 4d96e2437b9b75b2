//! The CLI's own error type. Every subcommand returns `Result<(), CliError>`
//! so `main` can map a failure onto the documented exit code (config errors
//! and runtime failures are distinguished; clap handles usage errors itself
//! before a subcommand ever runs).

use std::fmt;

#[derive(Debug)]
pub enum CliError {
    /// Configuration failed to load, or the registry/state it describes
    /// could not be built. Exit code 3.
    Config(String),
    /// The command parsed fine but failed while doing its work -- a
    /// network call, an upstream dispatch, a malformed payload. Exit code 2.
    Runtime(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 3,
            CliError::Runtime(_) => 2,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{msg}"),
            CliError::Runtime(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<acton_service::error::Error> for CliError {
    fn from(err: acton_service::error::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
