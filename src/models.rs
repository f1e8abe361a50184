//! Domain records shared by the pipeline, storage and service layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude (north positive)
    pub latitude: f64,
    /// Longitude (east positive)
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// How a coordinate (or a failure) was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeSource {
    /// Served from the geocoding cache
    Cache,
    /// Original city text matched
    Direct,
    /// Matched after stripping an administrative prefix
    Cleaned,
    /// Matched through the misspelling table
    Corrected,
    /// Matched through a derived spelling variant
    Fuzzy,
    /// Supplied by an operator
    Manual,
    /// Every variant was exhausted without an in-region hit
    Failed,
}

impl GeocodeSource {
    /// Tag stored in SQL.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeSource::Cache => "cache",
            GeocodeSource::Direct => "direct",
            GeocodeSource::Cleaned => "cleaned",
            GeocodeSource::Corrected => "corrected",
            GeocodeSource::Fuzzy => "fuzzy",
            GeocodeSource::Manual => "manual",
            GeocodeSource::Failed => "failed",
        }
    }
}

impl fmt::Display for GeocodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeocodeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cache" => Ok(GeocodeSource::Cache),
            "direct" => Ok(GeocodeSource::Direct),
            "cleaned" => Ok(GeocodeSource::Cleaned),
            "corrected" => Ok(GeocodeSource::Corrected),
            "fuzzy" => Ok(GeocodeSource::Fuzzy),
            "manual" => Ok(GeocodeSource::Manual),
            "failed" => Ok(GeocodeSource::Failed),
            other => Err(format!("unknown geocode source '{other}'")),
        }
    }
}

/// Snapshot of a listing awaiting (or done with) coordinate resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeTarget {
    /// Row id
    pub id: i64,
    /// Raw city text as scraped
    pub city: String,
    /// Listing title, for operator context
    pub title: Option<String>,
    /// Number of resolution attempts so far
    pub attempts: u32,
    /// Resolved coordinate, if any
    pub coordinates: Option<Coordinates>,
    /// Whether the target holds a verified in-region coordinate
    pub geocoded: bool,
    /// Source of the last write
    pub source: Option<GeocodeSource>,
    /// Ingestion time (ms since epoch)
    pub first_seen_ms: i64,
    /// Time of the last write (ms since epoch)
    pub last_geocoded_ms: Option<i64>,
}

/// A target that exhausted its automated attempts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalatedEntry {
    /// Row id
    pub id: i64,
    /// Referenced target
    pub target_id: i64,
    /// City text at escalation time
    pub city: String,
    /// Listing title at escalation time
    pub title: Option<String>,
    /// Attempt count at the last escalation
    pub attempts: u32,
    /// Last attempt time (ms since epoch)
    pub last_attempt_ms: i64,
    /// Last failure description
    pub error_message: Option<String>,
    /// Operator-suggested coordinate
    pub suggested: Option<Coordinates>,
    /// Cleared by a manual fix
    pub resolved: bool,
    /// Whether the target has since been geocoded by a retry pass
    pub target_geocoded: bool,
    /// Creation time (ms since epoch)
    pub created_at_ms: i64,
    /// Time the entry was resolved (ms since epoch)
    pub resolved_at_ms: Option<i64>,
}

/// The single dynamic settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingSettings {
    /// Master switch for batch runs
    pub enabled: bool,
    /// Default number of targets per forward batch
    pub batch_size: u32,
    /// Mandatory delay between batch items in seconds
    pub delay_seconds: f64,
    /// Attempts before escalation
    pub max_attempts: u32,
    /// Hours before an escalated target is eligible for a retry pass
    pub retry_failed_after_hours: u32,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        use crate::config::{
            DEFAULT_BATCH_SIZE, DEFAULT_DELAY_SECONDS, DEFAULT_MAX_ATTEMPTS,
            DEFAULT_RETRY_FAILED_AFTER_HOURS,
        };
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            delay_seconds: DEFAULT_DELAY_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_failed_after_hours: DEFAULT_RETRY_FAILED_AFTER_HOURS,
        }
    }
}

/// Counts of targets by lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TargetCounts {
    /// All targets
    pub total: u64,
    /// Holding a verified coordinate
    pub resolved: u64,
    /// Unresolved with attempts at or above the maximum
    pub escalated: u64,
    /// Unresolved and still eligible for forward batches
    pub pending: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_geocode_source_tags_parse_back() {
        for source in GeocodeSource::iter() {
            assert_eq!(source.as_str().parse::<GeocodeSource>(), Ok(source));
        }
        assert!("google".parse::<GeocodeSource>().is_err());
    }

    #[test]
    fn test_geocode_source_serializes_lowercase() {
        let json = serde_json::to_string(&GeocodeSource::Corrected).expect("serialize");
        assert_eq!(json, "\"corrected\"");
    }

    #[test]
    fn test_settings_default() {
        let settings = GeocodingSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.delay_seconds, 1.1);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.retry_failed_after_hours, 24);
    }
}
