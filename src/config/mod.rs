//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, defaults)
//! - Library configuration and log option types
//! - File-backed normalization and region tables

mod constants;
mod data;
mod types;

// Re-export all constants
pub use constants::*;
pub use data::{GeocodingData, NormalizerTables, RegionConfig};
pub use types::{Config, LogFormat, LogLevel};
