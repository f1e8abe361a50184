//! Operator edits to the dynamic settings record.

use crate::error_handling::SettingsError;
use crate::models::GeocodingSettings;

/// Setting names accepted by `apply_setting`.
pub const SETTING_KEYS: [&str; 5] = [
    "enabled",
    "batch_size",
    "delay_seconds",
    "max_attempts",
    "retry_failed_after_hours",
];

/// Parses `value` and stores it under `key`.
///
/// Values are validated against the same limits the database enforces, so a
/// bad edit is reported by name instead of as a constraint failure.
pub fn apply_setting(
    settings: &mut GeocodingSettings,
    key: &str,
    value: &str,
) -> Result<(), SettingsError> {
    let value = value.trim();
    let invalid = |reason: &str| SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    match key.trim() {
        "enabled" => {
            settings.enabled = parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
        }
        "batch_size" => {
            settings.batch_size = parse_positive(value).ok_or_else(|| invalid("expected a positive integer"))?;
        }
        "max_attempts" => {
            settings.max_attempts = parse_positive(value).ok_or_else(|| invalid("expected a positive integer"))?;
        }
        "retry_failed_after_hours" => {
            settings.retry_failed_after_hours = value
                .parse::<u32>()
                .map_err(|_| invalid("expected a non-negative integer"))?;
        }
        "delay_seconds" => {
            let delay = value
                .parse::<f64>()
                .map_err(|_| invalid("expected a number of seconds"))?;
            if !delay.is_finite() || delay < 0.0 {
                return Err(invalid("must be a finite, non-negative number"));
            }
            settings.delay_seconds = delay;
        }
        other => return Err(SettingsError::UnknownKey(other.to_string())),
    }
    Ok(())
}

/// Splits a `KEY=VALUE` argument.
pub fn parse_assignment(assignment: &str) -> Option<(&str, &str)> {
    assignment
        .split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v > 0)
}
