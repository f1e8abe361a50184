//! Main application modules.
//!
//! This module provides shutdown handling and statistics printing used by the
//! daemon and the one-shot commands.

pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use shutdown::{shutdown_gracefully, wait_for_shutdown_signal};
pub use statistics::print_outcome_statistics;
