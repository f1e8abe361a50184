//! Configuration constants.
//!
//! This module defines the defaults and limits used throughout the application:
//! provider timeouts and pacing, batch defaults, back-off windows and the
//! size limits applied to stored error text.

use std::time::Duration;

/// Default SQLite database path
pub const DB_PATH: &str = "./listing_geocoder.db";

/// Default directory holding the editable normalization and region tables
pub const DATA_DIR: &str = "./geocoding_data";

// Provider defaults
/// Default Nominatim search endpoint
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Default User-Agent sent to the lookup provider.
///
/// Nominatim's usage policy requires an identifying User-Agent; override it
/// with `--user-agent` when running against the public instance.
pub const DEFAULT_USER_AGENT: &str = "PropertyMonitor/2.0";

/// Per-query timeout in seconds
pub const QUERY_TIMEOUT_SECS: u64 = 10;

/// Minimum interval between two provider requests in milliseconds.
/// The public Nominatim instance allows at most one request per second.
pub const QUERY_INTERVAL_MS: u64 = 1100;

/// Number of results requested per query
pub const QUERY_RESULT_LIMIT: u8 = 1;

// Batch defaults (seed values for the settings record)
/// Targets pulled per forward batch
pub const DEFAULT_BATCH_SIZE: u32 = 50;
/// Delay between two batch items in seconds
pub const DEFAULT_DELAY_SECONDS: f64 = 1.1;
/// Attempts before a target is escalated to manual review
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Hours an escalated target waits before a retry pass picks it up again
pub const DEFAULT_RETRY_FAILED_AFTER_HOURS: u32 = 24;
/// Default size of a retry pass
pub const DEFAULT_RETRY_MAX: u32 = 50;

/// Interval between scheduled batch runs in minutes
pub const SCHEDULE_INTERVAL_MINUTES: u64 = 60;

// Normalization limits
/// Maximum number of resolution variants derived from one city string
pub const MAX_VARIANTS: usize = 8;
/// Variants of this length or shorter are discarded
pub const MIN_VARIANT_LENGTH: usize = 1;
/// Separator used when joining cache key tokens
pub const CACHE_KEY_SEPARATOR: char = '_';

// Provider back-off
/// First back-off window after a quota signal without Retry-After
pub const BACKOFF_BASE: Duration = Duration::from_secs(60);
/// Upper bound for the back-off window
pub const BACKOFF_MAX: Duration = Duration::from_secs(60 * 60);

/// HTTP status code for Too Many Requests
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// Non-standard "bandwidth limit exceeded", used by some Nominatim mirrors
pub const HTTP_STATUS_BANDWIDTH_LIMIT_EXCEEDED: u16 = 509;

// Error message limits
/// Maximum error message length in characters (2000 chars)
/// Error messages longer than this are truncated with a note about the original length
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;

/// Maximum number of error strings kept in one batch outcome
pub const MAX_OUTCOME_ERRORS: usize = 100;

/// Default number of rows returned by listing commands
pub const DEFAULT_LIST_LIMIT: u32 = 50;
