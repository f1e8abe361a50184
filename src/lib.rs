//! listing_geocoder library: city-name resolution for property listings
//!
//! This library turns free-text Polish city names scraped from auction
//! listings into coordinates inside a configured region. Names are
//! normalized into an ordered list of variants, resolved through a cache and
//! an external provider (Nominatim), validated against a bounding rectangle,
//! and written back to SQLite. Targets that keep failing are escalated for
//! manual review.
//!
//! # Example
//!
//! ```no_run
//! use listing_geocoder::{Config, GeocodingService};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     db_path: std::path::PathBuf::from("./listings.db"),
//!     query_interval_ms: 2000,
//!     ..Default::default()
//! };
//!
//! let service = GeocodingService::init(config).await?;
//! let outcome = service.run_batch(Some(20)).await?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

mod app;
mod backoff;
pub mod cli;
pub mod config;
mod error_handling;
mod escalation;
pub mod initialization;
mod models;
mod normalize;
mod pipeline;
mod provider;
mod region;
mod resolve;
mod scheduler;
mod service;
mod storage;
mod utils;

// Re-export public API
pub use backoff::ProviderBackoff;
pub use config::{Config, GeocodingData, LogFormat, LogLevel, NormalizerTables, RegionConfig};
pub use error_handling::{
    DatabaseError, ErrorType, InitializationError, ManualFixError, PipelineError, ProviderError,
    ResolveError, SettingsError,
};
pub use escalation::ManualFixReport;
pub use models::{
    Coordinates, EscalatedEntry, GeocodeSource, GeocodeTarget, GeocodingSettings, TargetCounts,
};
pub use normalize::{NameNormalizer, Strategy, Variant};
pub use pipeline::{BatchMode, BatchOutcome};
pub use provider::{GeocodeProvider, NominatimClient};
pub use region::RegionBounds;
pub use resolve::{Resolution, ResolveOutcome, Resolver};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::{
    apply_setting, parse_assignment, parse_line, GeocodingService, ImportError, ImportReport,
    StatusReport, SETTING_KEYS,
};
pub use storage::{run_migrations, AuditEvent, AuditKind, AuditStatus};
pub use utils::format_timestamp_ms;
