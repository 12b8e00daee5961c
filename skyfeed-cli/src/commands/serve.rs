//! Serve command - run the flight API server.

use std::net::SocketAddr;
use std::path::Path;

use skyfeed::app::run_server;
use skyfeed::provider::auth::{CLIENT_ID_ENV, CLIENT_SECRET_ENV};
use skyfeed::provider::ClientCredentials;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the serve command.
pub struct ServeArgs {
    pub bind: Option<SocketAddr>,
}

/// Run the serve command until Ctrl-C.
pub fn run(args: ServeArgs, config_path: Option<&Path>) -> Result<(), CliError> {
    let mut runner = CliRunner::new(config_path)?;
    if let Some(bind) = args.bind {
        runner.config_mut().server.bind = bind;
    }
    runner.log_startup("serve");

    let config = runner.config().clone();
    println!("SkyFeed v{}", skyfeed::VERSION);
    println!("============");
    println!();
    println!("Listening:  http://{}", config.server.bind);
    println!("Upstream:   {}", config.upstream.states_url);
    println!(
        "Cache:      {} ms TTL, {} ms stale ceiling, {}° grid",
        config.cache.ttl_ms, config.cache.stale_ceiling_ms, config.cache.key_step
    );
    if ClientCredentials::from_env().is_none() {
        println!(
            "Auth:       anonymous (set {} and {} for higher limits)",
            CLIENT_ID_ENV, CLIENT_SECRET_ENV
        );
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    runner.block_on(run_server(&config, runner.shutdown_token()))?;

    println!("Server stopped.");
    Ok(())
}
