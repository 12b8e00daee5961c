//! Configuration file.
//!
//! Settings live in an INI file at `<config dir>/skyfeed/config.ini`:
//!
//! ```ini
//! [server]
//! bind = 127.0.0.1:3000
//!
//! [upstream]
//! states_url = https://opensky-network.org/api/states/all
//! bulk_timeout_secs = 8
//!
//! [cache]
//! ttl_ms = 5000
//! key_step = 0.5
//!
//! [client]
//! server_url = http://127.0.0.1:3000
//! fps = 30
//!
//! [logging]
//! level = info
//! ```
//!
//! A missing file means defaults, unknown keys are ignored and a value that
//! does not parse is an error. Upstream credentials are never read from this
//! file, only from `OPENSKY_CLIENT_ID` / `OPENSKY_CLIENT_SECRET`.

mod keys;

pub use keys::ConfigKey;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::client::{PollerConfig, DEFAULT_SERVER_URL};
use crate::interpolation::DEFAULT_FPS;
use crate::provider::auth::DEFAULT_TOKEN_URL;
use crate::provider::opensky::DEFAULT_STATES_URL;
use crate::route::{DEFAULT_ADSBDB_URL, DEFAULT_ROUTE_TIMEOUT};
use crate::server::DEFAULT_BIND;
use crate::service::{DEFAULT_BULK_TIMEOUT, DEFAULT_SINGLE_TIMEOUT};

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no configuration directory on this platform")]
    NoConfigDir,
}

/// Default location of the configuration file.
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("skyfeed").join("config.ini"))
}

/// `[server]`
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

/// `[upstream]`
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamSettings {
    pub states_url: String,
    pub token_url: String,
    pub route_url: String,
    pub bulk_timeout: Duration,
    pub single_timeout: Duration,
    pub route_timeout: Duration,
}

/// `[client]`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub fps: u32,
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default level for SkyFeed targets; `RUST_LOG` overrides it.
    pub level: String,
    /// Also log to this file when set.
    pub file: Option<PathBuf>,
}

/// All settings of the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    pub cache: CacheConfig,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind: DEFAULT_BIND
                    .parse()
                    .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000))),
            },
            upstream: UpstreamSettings {
                states_url: DEFAULT_STATES_URL.to_string(),
                token_url: DEFAULT_TOKEN_URL.to_string(),
                route_url: DEFAULT_ADSBDB_URL.to_string(),
                bulk_timeout: DEFAULT_BULK_TIMEOUT,
                single_timeout: DEFAULT_SINGLE_TIMEOUT,
                route_timeout: DEFAULT_ROUTE_TIMEOUT,
            },
            cache: CacheConfig::default(),
            client: ClientSettings {
                server_url: DEFAULT_SERVER_URL.to_string(),
                poll_interval: PollerConfig::default().poll_interval,
                retry_delay: PollerConfig::default().retry_delay,
                fps: DEFAULT_FPS,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

impl ConfigFile {
    /// Load from the default location; defaults if there is no file.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load from `path`; defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini_str(&text).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse INI text, starting from defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Render the effective configuration as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, self.to_ini_string()).map_err(write_err)
    }

    /// Poll loop timing from `[client]`.
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig::default()
            .with_poll_interval(self.client.poll_interval)
            .with_retry_delay(self.client.retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.cache.ttl_ms, 5_000);
        assert_eq!(config.server.bind.port(), 3000);
    }

    #[test]
    fn test_load_overrides_and_ignores_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nbind = 0.0.0.0:8080\n\n[cache]\nttl_ms = 2500\nkey_step = 0.25\nmystery = 1\n\n\
             [client]\nfps = 60\n\n[logging]\nlevel = debug\nfile = /tmp/skyfeed.log\n\n[extra]\nfoo = bar"
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.cache.ttl_ms, 2_500);
        assert_eq!(config.cache.key_step, 0.25);
        assert_eq!(config.cache.stale_ceiling_ms, 60_000);
        assert_eq!(config.client.fps, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/skyfeed.log")));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = ConfigFile::from_ini_str("[cache]\nttl_ms = soon\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "cache.ttl_ms");
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.upstream.bulk_timeout = Duration::from_secs(12);
        config.client.server_url = "http://flights.local:9000".to_string();
        config.save_to(&path).unwrap();

        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_ini_rendering_lists_sections() {
        let text = ConfigFile::default().to_ini_string();
        assert!(text.contains("[server]"));
        assert!(text.contains("bind=127.0.0.1:3000"));
        assert!(text.contains("[cache]"));
        assert!(text.contains("ttl_ms=5000"));
        // Unset optional values are left out.
        assert!(!text.contains("file="));
    }
}
