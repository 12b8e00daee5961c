//! Configuration management CLI commands.
//!
//! Provides `config show`, `config get`, `config set`, `config list`, and
//! `config path` for viewing and modifying settings from the command line.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use skyfeed::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as INI
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., cache.ttl_ms)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., cache.ttl_ms)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path`, or the default file.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Get { key } => run_get(path, &key),
        ConfigCommands::Set { key, value } => run_set(path, &key, &value),
        ConfigCommands::List => run_list(path),
        ConfigCommands::Path => run_path(path),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'skyfeed config list' to see available keys.",
            key
        ))
    })
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, CliError> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path().ok_or_else(|| {
            CliError::Config("No configuration directory on this platform; use --config".into())
        }),
    }
}

/// Print the effective configuration.
fn run_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;
    print!("{}", config.to_ini_string());
    Ok(())
}

/// Get a configuration value.
fn run_get(path: Option<&Path>, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = load_config(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
fn run_set(path: Option<&Path>, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let file = resolve_path(path)?;

    let mut config = ConfigFile::load_from(&file)?;
    config_key.set(&mut config, value)?;
    config.save_to(&file)?;

    println!("Set {} = {}", config_key.name(), config_key.get(&config));

    Ok(())
}

/// List all configuration settings.
fn run_list(path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path(path: Option<&Path>) -> Result<(), CliError> {
    println!("{}", resolve_path(path)?.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        run(
            ConfigCommands::Set {
                key: "cache.ttl_ms".to_string(),
                value: "2500".to_string(),
            },
            Some(&path),
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.cache.ttl_ms, 2_500);
    }

    #[test]
    fn test_unknown_key_and_bad_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");

        let unknown = run(ConfigCommands::Get { key: "cache.nope".to_string() }, Some(&path));
        assert!(matches!(unknown, Err(CliError::Config(_))));

        let invalid = run(
            ConfigCommands::Set {
                key: "client.fps".to_string(),
                value: "fast".to_string(),
            },
            Some(&path),
        );
        assert!(matches!(invalid, Err(CliError::Config(_))));
        assert!(!path.exists());
    }
}
