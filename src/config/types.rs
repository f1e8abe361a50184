//! Configuration types.
//!
//! This module defines the enums and structs used for command-line argument
//! parsing and library configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DATA_DIR, DB_PATH, DEFAULT_NOMINATIM_URL, DEFAULT_USER_AGENT, QUERY_INTERVAL_MS,
    QUERY_TIMEOUT_SECS, SCHEDULE_INTERVAL_MINUTES,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Library configuration (no CLI dependencies).
///
/// Static wiring for one geocoder instance. The dynamic knobs (enabled flag,
/// batch size, delay, max attempts, retry window) live in the settings record
/// in the database so operators can change them without a restart.
///
/// # Examples
///
/// ```no_run
/// use listing_geocoder::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     db_path: PathBuf::from("./listings.db"),
///     query_interval_ms: 2000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Database path (SQLite file)
    pub db_path: PathBuf,

    /// Directory holding correction, diacritic, prefix and region tables
    pub data_dir: PathBuf,

    /// Lookup provider search endpoint
    pub nominatim_url: String,

    /// HTTP User-Agent header value sent to the provider
    pub user_agent: String,

    /// Per-query timeout in seconds
    pub query_timeout_secs: u64,

    /// Minimum interval between provider requests in milliseconds
    pub query_interval_ms: u64,

    /// Interval between scheduled batch runs in minutes
    pub schedule_interval_minutes: u64,
}

impl Config {
    /// Per-query timeout as a `Duration`.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Minimum spacing between provider requests as a `Duration`.
    pub fn query_interval(&self) -> Duration {
        Duration::from_millis(self.query_interval_ms)
    }

    /// Scheduler interval as a `Duration`.
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes.saturating_mul(60))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            db_path: PathBuf::from(DB_PATH),
            data_dir: PathBuf::from(DATA_DIR),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            query_timeout_secs: QUERY_TIMEOUT_SECS,
            query_interval_ms: QUERY_INTERVAL_MS,
            schedule_interval_minutes: SCHEDULE_INTERVAL_MINUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_log_level_ordering() {
        let error = log::LevelFilter::from(LogLevel::Error);
        let warn = log::LevelFilter::from(LogLevel::Warn);
        let info = log::LevelFilter::from(LogLevel::Info);
        let debug = log::LevelFilter::from(LogLevel::Debug);
        let trace = log::LevelFilter::from(LogLevel::Trace);

        assert!(error < warn);
        assert!(warn < info);
        assert!(info < debug);
        assert!(debug < trace);
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from("./listing_geocoder.db"));
        assert_eq!(config.data_dir, PathBuf::from("./geocoding_data"));
        assert_eq!(config.user_agent, "PropertyMonitor/2.0");
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        assert_eq!(config.query_interval(), Duration::from_millis(1100));
        assert_eq!(config.schedule_interval(), Duration::from_secs(3600));
    }
}
