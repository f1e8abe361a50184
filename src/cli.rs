//! Command-line interface definition.
//!
//! Global options build the library `Config`; each subcommand maps onto one
//! `GeocodingService` operation. Every global option can also be set through
//! the environment (or a `.env` file).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{
    Config, LogFormat, LogLevel, DATA_DIR, DB_PATH, DEFAULT_LIST_LIMIT, DEFAULT_NOMINATIM_URL,
    DEFAULT_RETRY_MAX, DEFAULT_USER_AGENT, QUERY_INTERVAL_MS, QUERY_TIMEOUT_SECS,
    SCHEDULE_INTERVAL_MINUTES,
};

/// Resolve free-text city names on property listings to coordinates.
#[derive(Debug, Parser)]
#[command(name = "listing_geocoder", version, about)]
pub struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info, env = "GEOCODER_LOG_LEVEL", global = true)]
    pub log_level: LogLevel,

    /// Log format: plain or json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, env = "GEOCODER_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// SQLite database path
    #[arg(long, value_parser, default_value = DB_PATH, env = "GEOCODER_DB_PATH", global = true)]
    pub db_path: PathBuf,

    /// Directory holding the correction, diacritic, prefix and region tables
    ///
    /// Missing files are created with the built-in Polish defaults.
    #[arg(long, value_parser, default_value = DATA_DIR, env = "GEOCODER_DATA_DIR", global = true)]
    pub data_dir: PathBuf,

    /// Nominatim search endpoint
    #[arg(long, default_value = DEFAULT_NOMINATIM_URL, env = "NOMINATIM_URL", global = true)]
    pub nominatim_url: String,

    /// HTTP User-Agent sent to the provider
    ///
    /// The public Nominatim instance requires an identifying User-Agent.
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "GEOCODER_USER_AGENT", global = true)]
    pub user_agent: String,

    /// Per-query timeout in seconds
    #[arg(long, default_value_t = QUERY_TIMEOUT_SECS, env = "GEOCODER_QUERY_TIMEOUT_SECS", global = true)]
    pub query_timeout_secs: u64,

    /// Minimum interval between provider requests in milliseconds
    #[arg(long, default_value_t = QUERY_INTERVAL_MS, env = "GEOCODER_QUERY_INTERVAL_MS", global = true)]
    pub query_interval_ms: u64,

    /// Interval between scheduled batches in minutes (daemon only)
    #[arg(long, default_value_t = SCHEDULE_INTERVAL_MINUTES, env = "GEOCODER_SCHEDULE_INTERVAL_MINUTES", global = true)]
    pub schedule_interval_minutes: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed on the command line.
#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab-case")]
pub enum Command {
    /// Run one batch over pending targets
    Geocode {
        /// Override the configured batch size for this run
        #[arg(long)]
        batch_size: Option<u32>,
    },
    /// Re-run escalated targets whose retry window has passed
    Retry {
        /// Maximum number of targets to retry
        #[arg(long, default_value_t = DEFAULT_RETRY_MAX)]
        max: u32,
    },
    /// Show target counts, settings and back-off state
    Status,
    /// List escalated targets awaiting manual review
    Failed {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: u32,
    },
    /// Set a coordinate manually and resolve the escalated entry
    Fix {
        /// Target id
        id: i64,
        /// Latitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Attach a suggested coordinate to an escalated target
    Suggest {
        /// Target id
        id: i64,
        /// Latitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Resolve an escalated target with its stored suggestion
    Accept {
        /// Target id
        id: i64,
    },
    /// Show or change the dynamic settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recent batch runs and operator actions
    History {
        /// Maximum number of events to show
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT as usize)]
        limit: usize,
    },
    /// Add targets from a file (one `city` or `city<TAB>title` per line, `-` for stdin)
    Import {
        /// Input file, or `-` for stdin
        file: PathBuf,
    },
    /// Run batches on a fixed schedule until Ctrl-C
    Daemon,
}

/// `config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change one setting, e.g. `batch_size=20`
    Set {
        /// `KEY=VALUE`
        assignment: String,
    },
}

impl Cli {
    /// Library configuration built from the global options.
    pub fn to_config(&self) -> Config {
        Config {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            db_path: self.db_path.clone(),
            data_dir: self.data_dir.clone(),
            nominatim_url: self.nominatim_url.clone(),
            user_agent: self.user_agent.clone(),
            query_timeout_secs: self.query_timeout_secs,
            query_interval_ms: self.query_interval_ms,
            schedule_interval_minutes: self.schedule_interval_minutes,
        }
    }
}
