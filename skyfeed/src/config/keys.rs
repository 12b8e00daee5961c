//! Typed access to individual configuration settings.
//!
//! Every setting the file understands is a [`ConfigKey`]. Loading, rendering
//! and the `config get`/`config set` commands all go through the same table,
//! so a key cannot be readable but not writable.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{ConfigError, ConfigFile};

/// A single `section.key` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ServerBind,
    UpstreamStatesUrl,
    UpstreamTokenUrl,
    UpstreamRouteUrl,
    UpstreamBulkTimeoutSecs,
    UpstreamSingleTimeoutSecs,
    UpstreamRouteTimeoutSecs,
    CacheTtlMs,
    CacheStaleCeilingMs,
    CacheKeyStep,
    CacheMaxRegionEntries,
    CacheSingleTtlMs,
    CacheMaxSingleEntries,
    ClientServerUrl,
    ClientPollIntervalMs,
    ClientRetryDelayMs,
    ClientFps,
    LoggingLevel,
    LoggingFile,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::ServerBind,
    ConfigKey::UpstreamStatesUrl,
    ConfigKey::UpstreamTokenUrl,
    ConfigKey::UpstreamRouteUrl,
    ConfigKey::UpstreamBulkTimeoutSecs,
    ConfigKey::UpstreamSingleTimeoutSecs,
    ConfigKey::UpstreamRouteTimeoutSecs,
    ConfigKey::CacheTtlMs,
    ConfigKey::CacheStaleCeilingMs,
    ConfigKey::CacheKeyStep,
    ConfigKey::CacheMaxRegionEntries,
    ConfigKey::CacheSingleTtlMs,
    ConfigKey::CacheMaxSingleEntries,
    ConfigKey::ClientServerUrl,
    ConfigKey::ClientPollIntervalMs,
    ConfigKey::ClientRetryDelayMs,
    ConfigKey::ClientFps,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingFile,
];

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ServerBind => "server",
            UpstreamStatesUrl
            | UpstreamTokenUrl
            | UpstreamRouteUrl
            | UpstreamBulkTimeoutSecs
            | UpstreamSingleTimeoutSecs
            | UpstreamRouteTimeoutSecs => "upstream",
            CacheTtlMs
            | CacheStaleCeilingMs
            | CacheKeyStep
            | CacheMaxRegionEntries
            | CacheSingleTtlMs
            | CacheMaxSingleEntries => "cache",
            ClientServerUrl | ClientPollIntervalMs | ClientRetryDelayMs | ClientFps => "client",
            LoggingLevel | LoggingFile => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            ServerBind => "bind",
            UpstreamStatesUrl => "states_url",
            UpstreamTokenUrl => "token_url",
            UpstreamRouteUrl => "route_url",
            UpstreamBulkTimeoutSecs => "bulk_timeout_secs",
            UpstreamSingleTimeoutSecs => "single_timeout_secs",
            UpstreamRouteTimeoutSecs => "route_timeout_secs",
            CacheTtlMs => "ttl_ms",
            CacheStaleCeilingMs => "stale_ceiling_ms",
            CacheKeyStep => "key_step",
            CacheMaxRegionEntries => "max_region_entries",
            CacheSingleTtlMs => "single_ttl_ms",
            CacheMaxSingleEntries => "max_single_entries",
            ClientServerUrl => "server_url",
            ClientPollIntervalMs => "poll_interval_ms",
            ClientRetryDelayMs => "retry_delay_ms",
            ClientFps => "fps",
            LoggingLevel => "level",
            LoggingFile => "file",
        }
    }

    /// `section.key`
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            ServerBind => config.server.bind.to_string(),
            UpstreamStatesUrl => config.upstream.states_url.clone(),
            UpstreamTokenUrl => config.upstream.token_url.clone(),
            UpstreamRouteUrl => config.upstream.route_url.clone(),
            UpstreamBulkTimeoutSecs => config.upstream.bulk_timeout.as_secs().to_string(),
            UpstreamSingleTimeoutSecs => config.upstream.single_timeout.as_secs().to_string(),
            UpstreamRouteTimeoutSecs => config.upstream.route_timeout.as_secs().to_string(),
            CacheTtlMs => config.cache.ttl_ms.to_string(),
            CacheStaleCeilingMs => config.cache.stale_ceiling_ms.to_string(),
            CacheKeyStep => config.cache.key_step.to_string(),
            CacheMaxRegionEntries => config.cache.max_region_entries.to_string(),
            CacheSingleTtlMs => config.cache.single_ttl_ms.to_string(),
            CacheMaxSingleEntries => config.cache.max_single_entries.to_string(),
            ClientServerUrl => config.client.server_url.clone(),
            ClientPollIntervalMs => config.client.poll_interval.as_millis().to_string(),
            ClientRetryDelayMs => config.client.retry_delay.as_millis().to_string(),
            ClientFps => config.client.fps.to_string(),
            LoggingLevel => config.logging.level.clone(),
            LoggingFile => config
                .logging
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            ServerBind => config.server.bind = self.parse(value)?,
            UpstreamStatesUrl => config.upstream.states_url = self.non_empty(value)?,
            UpstreamTokenUrl => config.upstream.token_url = self.non_empty(value)?,
            UpstreamRouteUrl => config.upstream.route_url = self.non_empty(value)?,
            UpstreamBulkTimeoutSecs => config.upstream.bulk_timeout = self.secs(value)?,
            UpstreamSingleTimeoutSecs => config.upstream.single_timeout = self.secs(value)?,
            UpstreamRouteTimeoutSecs => config.upstream.route_timeout = self.secs(value)?,
            CacheTtlMs => config.cache.ttl_ms = self.positive(value)?,
            CacheStaleCeilingMs => config.cache.stale_ceiling_ms = self.positive(value)?,
            CacheKeyStep => {
                let step: f64 = self.parse(value)?;
                if !(step.is_finite() && step > 0.0) {
                    return Err(self.invalid(value, "must be a positive number"));
                }
                config.cache.key_step = step;
            }
            CacheMaxRegionEntries => config.cache.max_region_entries = self.parse(value)?,
            CacheSingleTtlMs => config.cache.single_ttl_ms = self.positive(value)?,
            CacheMaxSingleEntries => config.cache.max_single_entries = self.parse(value)?,
            ClientServerUrl => config.client.server_url = self.non_empty(value)?,
            ClientPollIntervalMs => config.client.poll_interval = self.millis(value)?,
            ClientRetryDelayMs => config.client.retry_delay = self.millis(value)?,
            ClientFps => {
                let fps: u32 = self.parse(value)?;
                if fps == 0 {
                    return Err(self.invalid(value, "must be at least 1"));
                }
                config.client.fps = fps;
            }
            LoggingLevel => config.logging.level = self.non_empty(value)?,
            LoggingFile => {
                config.logging.file = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Display) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse().map_err(|e| self.invalid(value, e))
    }

    fn positive(&self, value: &str) -> Result<i64, ConfigError> {
        match self.parse::<i64>(value)? {
            n if n > 0 => Ok(n),
            _ => Err(self.invalid(value, "must be greater than zero")),
        }
    }

    fn secs(&self, value: &str) -> Result<Duration, ConfigError> {
        self.positive(value).map(|n| Duration::from_secs(n as u64))
    }

    fn millis(&self, value: &str) -> Result<Duration, ConfigError> {
        self.positive(value).map(|n| Duration::from_millis(n as u64))
    }

    fn non_empty(&self, value: &str) -> Result<String, ConfigError> {
        if value.is_empty() {
            Err(self.invalid(value, "must not be empty"))
        } else {
            Ok(value.to_string())
        }
    }
}

impl FromStr for ConfigKey {
    type Err = ();

    /// Parse `section.key`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_round_trips_through_text() {
        let defaults = ConfigFile::default();
        let mut config = ConfigFile::default();
        for key in ConfigKey::all() {
            let value = key.get(&defaults);
            if !value.is_empty() {
                key.set(&mut config, &value).unwrap();
            }
        }
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_parse_key_names() {
        assert_eq!("cache.ttl_ms".parse(), Ok(ConfigKey::CacheTtlMs));
        assert_eq!(" Server.Bind ".parse(), Ok(ConfigKey::ServerBind));
        assert!("cache.nope".parse::<ConfigKey>().is_err());
        assert_eq!(ConfigKey::all().len(), 19);
    }

    #[test]
    fn test_validation() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::CacheTtlMs.set(&mut config, "0").is_err());
        assert!(ConfigKey::CacheKeyStep.set(&mut config, "-1").is_err());
        assert!(ConfigKey::ClientFps.set(&mut config, "0").is_err());
        assert!(ConfigKey::ServerBind.set(&mut config, "localhost").is_err());
        assert!(ConfigKey::ClientServerUrl.set(&mut config, "  ").is_err());

        ConfigKey::LoggingFile.set(&mut config, "/var/log/skyfeed.log").unwrap();
        assert!(config.logging.file.is_some());
        ConfigKey::LoggingFile.set(&mut config, "").unwrap();
        assert!(config.logging.file.is_none());
    }
}
