//! SkyFeed CLI - Command-line interface
//!
//! Runs the flight API server, a headless viewer against it, one-off
//! snapshots, and manages the configuration file.

mod commands;
mod error;
mod runner;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use skyfeed::geo::BoundingBox;

use commands::common::parse_bounds;
use commands::config::ConfigCommands;
use commands::serve::ServeArgs;
use commands::snapshot::SnapshotArgs;
use commands::watch::WatchArgs;

#[derive(Debug, Parser)]
#[command(name = "skyfeed", version, about = "Live aircraft positions from the OpenSky feed")]
struct Cli {
    /// Configuration file (default: <config dir>/skyfeed/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the flight API server
    Serve {
        /// Listen address, overriding [server] bind
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Poll a server and dead-reckon aircraft, printing frame summaries
    Watch {
        /// Server base URL, overriding [client] server_url
        #[arg(long)]
        server: Option<String>,

        /// Viewport as S,W,N,E in degrees
        #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
        bounds: Option<BoundingBox>,

        /// Select an aircraft by ICAO 24-bit address
        #[arg(long, value_name = "ICAO24")]
        select: Option<String>,

        /// Use an in-process service instead of a server
        #[arg(long)]
        local: bool,

        /// Seconds between frame summaries
        #[arg(long, default_value_t = 2)]
        every: u64,
    },

    /// Fetch once in-process and print the JSON answer
    Snapshot {
        /// Bounding box as S,W,N,E in degrees
        #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
        bounds: Option<BoundingBox>,

        /// Fetch a single aircraft instead of a region
        #[arg(long, value_name = "ICAO24", conflicts_with = "bounds")]
        icao24: Option<String>,
    },

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve { bind } => commands::serve::run(ServeArgs { bind }, config_path),
        Commands::Watch {
            server,
            bounds,
            select,
            local,
            every,
        } => commands::watch::run(
            WatchArgs {
                server,
                bounds,
                select,
                local,
                report_secs: every,
            },
            config_path,
        ),
        Commands::Snapshot { bounds, icao24 } => {
            commands::snapshot::run(SnapshotArgs { bounds, icao24 }, config_path)
        }
        Commands::Config { command } => commands::config::run(command, config_path),
    };

    if let Err(e) = result {
        e.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_with_negative_bounds() {
        let cli = Cli::try_parse_from([
            "skyfeed", "watch", "--bounds", "-10,-20,10,20", "--select", "3C6444",
        ])
        .unwrap();
        match cli.command {
            Commands::Watch { bounds, select, every, .. } => {
                assert_eq!(bounds, Some(BoundingBox::normalized(-10.0, -20.0, 10.0, 20.0)));
                assert_eq!(select.as_deref(), Some("3C6444"));
                assert_eq!(every, 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_path_is_global() {
        let cli = Cli::try_parse_from(["skyfeed", "config", "show", "--config", "/tmp/x.ini"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.ini")));
        assert!(matches!(
            cli.command,
            Commands::Config { command: ConfigCommands::Show }
        ));
    }
}
