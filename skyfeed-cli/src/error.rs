//! CLI error type.

use skyfeed::app::AppError;
use skyfeed::config::ConfigError;
use skyfeed::logging::LoggingError;
use thiserror::Error;

/// Errors surfaced to the user by any command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad configuration or command-line arguments.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A long-running command failed.
    #[error("{0}")]
    Serve(#[source] AppError),

    #[error("Flight API error: {0}")]
    Api(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Config(e) => CliError::Config(e.to_string()),
            other => CliError::Serve(other),
        }
    }
}

impl CliError {
    /// Print the error and exit with a failure status.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(1);
    }
}
