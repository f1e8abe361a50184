// storage/mod.rs
// Database operations module

pub mod audit;
pub mod cache;
pub mod escalation;
pub mod migrations;
pub mod pool;
pub mod settings;
pub mod targets;

#[cfg(test)]
pub mod test_helpers;

// Re-export commonly used items
pub use audit::{AuditEvent, AuditKind, AuditStatus};
pub use cache::CacheEntry;
pub use migrations::run_migrations;
pub use pool::init_db_pool_with_path;
