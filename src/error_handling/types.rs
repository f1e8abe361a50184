//! Error type definitions.
//!
//! This module defines the error enums used throughout the application and the
//! `ErrorType` categories counted per batch.

use std::time::Duration;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),

    /// The provider endpoint is not a valid URL.
    #[error("Provider URL error: {0}")]
    ProviderUrlError(#[from] url::ParseError),

    /// Error loading or writing a geocoding data file.
    #[error("Geocoding data error: {0}")]
    DataFileError(String),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// A stored value could not be mapped back to its domain type.
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Failure of a single provider query.
///
/// Everything except `Quota` is treated by the resolver as a non-match for the
/// query that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The query did not complete within the per-query timeout.
    #[error("lookup timed out")]
    Timeout,

    /// Network-level failure (connect, reset, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered but the body could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Non-success HTTP status other than a quota signal.
    #[error("provider returned HTTP {0}")]
    Status(u16),

    /// The provider asked us to slow down.
    #[error("provider quota exceeded (retry after {retry_after:?})")]
    Quota {
        /// Wait requested by the provider, if it sent one
        retry_after: Option<Duration>,
    },
}

/// Error that aborts a resolution chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// The provider signalled a quota limit; the caller should back off.
    #[error("provider throttled the lookup (retry after {retry_after:?})")]
    Throttled {
        /// Wait requested by the provider, if it sent one
        retry_after: Option<Duration>,
    },
}

/// Errors that reject or abort a batch run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Another batch is already in flight on this pipeline.
    #[error("a geocoding batch is already running")]
    Busy,

    /// Loading the batch or the settings record failed.
    #[error("storage failure: {0}")]
    Database(#[from] DatabaseError),
}

/// Errors returned by operator fixes on escalated targets.
#[derive(Error, Debug)]
pub enum ManualFixError {
    /// The coordinate lies outside the configured region.
    #[error("coordinate ({latitude}, {longitude}) is outside the configured region")]
    OutOfRegion {
        /// Rejected latitude
        latitude: f64,
        /// Rejected longitude
        longitude: f64,
    },

    /// No target exists with this id.
    #[error("no geocode target with id {0}")]
    UnknownTarget(i64),

    /// The target has no unresolved escalated entry.
    #[error("target {0} has no unresolved escalated entry")]
    NotEscalated(i64),

    /// The escalated entry carries no suggested coordinate.
    #[error("escalated entry for target {0} has no suggested coordinate")]
    NoSuggestion(i64),

    /// Storage failure while applying the fix.
    #[error("storage failure: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for ManualFixError {
    fn from(e: sqlx::Error) -> Self {
        ManualFixError::Database(DatabaseError::SqlError(e))
    }
}

/// Errors returned when updating the settings record.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The key does not name a setting.
    #[error("unknown setting '{0}' (expected one of: enabled, batch_size, delay_seconds, max_attempts, retry_failed_after_hours)")]
    UnknownKey(String),

    /// The value could not be parsed or is out of range.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// Raw value supplied by the operator
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Storage failure while persisting the change.
    #[error("storage failure: {0}")]
    Database(#[from] DatabaseError),
}

/// Categories of per-item failures counted during a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIterMacro)]
pub enum ErrorType {
    // Provider errors
    ProviderTimeout,
    ProviderTransport,
    ProviderMalformedResponse,
    ProviderHttpStatus,
    ProviderQuota,
    // Resolution outcomes
    OutOfRegionCandidate,
    NoMatch,
    // Storage
    DatabaseWrite,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    /// Human-readable label used in logs and outcome breakdowns.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::ProviderTimeout => "Provider timeout",
            ErrorType::ProviderTransport => "Provider transport error",
            ErrorType::ProviderMalformedResponse => "Provider malformed response",
            ErrorType::ProviderHttpStatus => "Provider HTTP status error",
            ErrorType::ProviderQuota => "Provider quota exceeded",
            ErrorType::OutOfRegionCandidate => "Out-of-region candidate",
            ErrorType::NoMatch => "No match",
            ErrorType::DatabaseWrite => "Database write error",
        }
    }
}
