//! Shared setup for the long-running commands.
//!
//! Loads the configuration, installs logging, starts the tokio runtime and
//! turns Ctrl-C into a cancelled [`CancellationToken`].

use std::future::Future;
use std::path::Path;

use skyfeed::config::ConfigFile;
use skyfeed::logging::{init_logging, LogGuard};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;

pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    shutdown: CancellationToken,
    _log_guard: LogGuard,
}

impl CliRunner {
    /// Set up with the configuration at `config_path`, or the default file.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        let log_guard = init_logging(&config.logging)?;
        let runtime = Runtime::new().map_err(CliError::Runtime)?;

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("received shutdown signal");
            token.cancel();
        })
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

        Ok(Self {
            config,
            runtime,
            shutdown,
            _log_guard: log_guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigFile {
        &mut self.config
    }

    /// Cancelled on Ctrl-C.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            version = skyfeed::VERSION,
            command,
            bind = %self.config.server.bind,
            server_url = %self.config.client.server_url,
            "SkyFeed starting"
        );
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Load from `path` when given, else from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}
