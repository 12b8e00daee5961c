//! Tracing subscriber setup.
//!
//! Console output goes to stderr so `skyfeed snapshot` can print JSON on
//! stdout. When `[logging] file` is set, the same events are also written,
//! without ANSI colours, through a non-blocking file appender.
//!
//! `RUST_LOG` wins over the configured level when it is set.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Crates whose events the default filter lets through.
const LOG_TARGETS: &[&str] = &["skyfeed", "skyfeed_cli"];

/// Errors from installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("invalid log file path {0}")]
    InvalidPath(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Keeps the file writer flushing; drop it last.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directives for `level` applied to SkyFeed targets.
pub fn default_directives(level: &str) -> Result<String, LoggingError> {
    let level: LevelFilter = level
        .trim()
        .parse()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))?;
    let level = level.to_string().to_lowercase();
    Ok(LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(","))
}

/// Install the global subscriber.
pub fn init_logging(settings: &LoggingSettings) -> Result<LogGuard, LoggingError> {
    let directives = default_directives(&settings.level)?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&directives))
        .map_err(|e| LoggingError::Filter(e.to_string()))?;

    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone());

    let (file_layer, file_guard) = match &settings.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LogGuard { _file: file_guard })
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr), LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives("debug").unwrap(),
            "skyfeed=debug,skyfeed_cli=debug"
        );
        assert_eq!(
            default_directives(" WARN ").unwrap(),
            "skyfeed=warn,skyfeed_cli=warn"
        );
        assert!(EnvFilter::try_new(default_directives("trace").unwrap()).is_ok());
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            default_directives("loud"),
            Err(LoggingError::InvalidLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/skyfeed/server.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log/skyfeed"));
        assert_eq!(name, "server.log");

        let (dir, name) = split_log_path(Path::new("skyfeed.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "skyfeed.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }
}
