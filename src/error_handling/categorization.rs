//! Error categorization.
//!
//! Maps transport-level failures onto `ProviderError` and provider errors onto
//! the `ErrorType` counters.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use super::stats::ProcessingStats;
use super::types::{ErrorType, ProviderError};
use crate::config::{HTTP_STATUS_BANDWIDTH_LIMIT_EXCEEDED, HTTP_STATUS_TOO_MANY_REQUESTS};

/// Categorizes a `reqwest::Error` into a `ProviderError`.
///
/// HTTP status codes are checked first so that quota responses surfaced via
/// `error_for_status` are never mistaken for generic failures.
pub fn categorize_reqwest_error(error: &reqwest::Error) -> ProviderError {
    if let Some(status) = error.status() {
        return categorize_status(status.as_u16(), None);
    }

    if error.is_timeout() {
        ProviderError::Timeout
    } else if error.is_decode() || error.is_body() {
        ProviderError::Malformed(error.to_string())
    } else {
        ProviderError::Transport(error.to_string())
    }
}

/// Categorizes a non-success HTTP status.
pub fn categorize_status(status: u16, retry_after: Option<Duration>) -> ProviderError {
    match status {
        HTTP_STATUS_TOO_MANY_REQUESTS | HTTP_STATUS_BANDWIDTH_LIMIT_EXCEEDED => {
            ProviderError::Quota { retry_after }
        }
        other => ProviderError::Status(other),
    }
}

/// Reads a `Retry-After` header given in seconds.
///
/// HTTP-date values are ignored; the caller falls back to its own back-off.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Maps a provider error onto its counter category.
pub fn categorize_provider_error(error: &ProviderError) -> ErrorType {
    match error {
        ProviderError::Timeout => ErrorType::ProviderTimeout,
        ProviderError::Transport(_) => ErrorType::ProviderTransport,
        ProviderError::Malformed(_) => ErrorType::ProviderMalformedResponse,
        ProviderError::Status(_) => ErrorType::ProviderHttpStatus,
        ProviderError::Quota { .. } => ErrorType::ProviderQuota,
    }
}

/// Updates processing statistics based on a provider error.
pub fn update_error_stats(stats: &ProcessingStats, error: &ProviderError) {
    stats.increment_error(categorize_provider_error(error));
}
