//! Batch statistics logging.

use log::info;

use crate::pipeline::BatchOutcome;

/// Logs the error breakdown and a one-line summary of a batch.
///
/// Works with both plain and JSON log formats (log::info! handles formatting).
pub fn print_outcome_statistics(outcome: &BatchOutcome) {
    let total_errors: usize = outcome.error_breakdown.values().sum();
    if total_errors > 0 {
        info!("Error Counts ({} total):", total_errors);
        for (label, count) in &outcome.error_breakdown {
            info!("   {}: {}", label, count);
        }
    }

    if let Some(last) = outcome.errors.last() {
        info!("Last failure: {}", last);
    }

    print_simple_summary(outcome);
}

fn print_simple_summary(outcome: &BatchOutcome) {
    let marker = if outcome.skipped_reason.is_some() {
        "⏭️"
    } else if outcome.throttled {
        "⏸️"
    } else {
        "✅"
    };
    info!("{} {} - see `history` for details", marker, outcome.summary());
}
