//! Graceful shutdown handling.

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::scheduler::SchedulerHandle;

/// Stops the scheduler and any in-flight batch.
///
/// Cancelling the token interrupts the batch between items (or during the
/// inter-item delay); items already written stay written. The scheduler task
/// is awaited so the process exits only after the last batch has returned.
pub async fn shutdown_gracefully(cancel: CancellationToken, scheduler: Option<SchedulerHandle>) {
    cancel.cancel();
    if let Some(handle) = scheduler {
        handle.join().await;
    }
    info!("Shutdown complete");
}

/// Resolves when the process receives Ctrl-C.
pub async fn wait_for_shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl-C ({e}), shutting down"),
    }
}
