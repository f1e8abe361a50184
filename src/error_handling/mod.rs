//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions for initialization, storage, provider, pipeline
//!   and operator paths
//! - Per-batch error counters keyed by `ErrorType`
//! - Categorization of transport failures into provider errors

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{
    categorize_provider_error, categorize_reqwest_error, categorize_status, parse_retry_after,
    update_error_stats,
};
pub use stats::ProcessingStats;
pub use types::{
    DatabaseError, ErrorType, InitializationError, ManualFixError, PipelineError, ProviderError,
    ResolveError, SettingsError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_processing_stats_initialization() {
        let stats = ProcessingStats::new();
        for error_type in ErrorType::iter() {
            assert_eq!(stats.get_error_count(error_type), 0);
        }
        assert!(stats.breakdown().is_empty());
    }

    #[test]
    fn test_processing_stats_increment() {
        let stats = ProcessingStats::new();
        stats.increment_error(ErrorType::ProviderTimeout);
        stats.increment_error(ErrorType::ProviderTimeout);
        stats.increment_error(ErrorType::NoMatch);

        assert_eq!(stats.get_error_count(ErrorType::ProviderTimeout), 2);
        assert_eq!(stats.total_errors(), 3);

        let breakdown = stats.breakdown();
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown.get("Provider timeout"), Some(&2));
        assert_eq!(breakdown.get("No match"), Some(&1));
    }

    #[test]
    fn test_update_error_stats_from_provider_error() {
        let stats = ProcessingStats::new();
        update_error_stats(&stats, &ProviderError::Status(503));
        assert_eq!(stats.get_error_count(ErrorType::ProviderHttpStatus), 1);
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::DatabaseWrite.to_string(), "Database write error");
    }
}
