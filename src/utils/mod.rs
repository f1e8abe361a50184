//! Utility functions.
//!
//! This module provides:
//! - Error text sanitization before storage
//! - Millisecond time helpers

pub mod sanitize;

pub use sanitize::{sanitize_and_truncate_error_message, sanitize_error_message};

/// Formats a millisecond epoch timestamp as RFC 3339, or `-` when absent.
pub fn format_timestamp_ms(ts_ms: Option<i64>) -> String {
    ts_ms
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}
