//! Batch outcome reporting.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::MAX_OUTCOME_ERRORS;
use crate::error_handling::ProcessingStats;
use crate::storage::{AuditKind, AuditStatus};
use crate::utils::sanitize_and_truncate_error_message;

/// Which population a batch drew from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Unresolved targets below the attempt limit
    Forward,
    /// Escalated targets past the retry window
    Retry,
}

impl BatchMode {
    pub(crate) fn audit_kind(self) -> AuditKind {
        match self {
            BatchMode::Forward => AuditKind::Batch,
            BatchMode::Retry => AuditKind::Retry,
        }
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Forward or retry
    pub mode: BatchMode,
    /// Items that ran to completion (cache hits included)
    pub processed: usize,
    /// Fresh provider resolutions
    pub succeeded: usize,
    /// Items served from the cache
    pub cached: usize,
    /// Items that ended without a coordinate
    pub failed: usize,
    /// Why the batch did nothing, when it was skipped
    pub skipped_reason: Option<String>,
    /// The provider signalled a quota limit and the batch stopped early
    pub throttled: bool,
    /// Cancellation was requested and the batch stopped early
    pub cancelled: bool,
    /// Wall-clock duration
    pub duration_seconds: f64,
    /// Per-item error descriptions, capped
    pub errors: Vec<String>,
    /// Non-zero error counters by category
    pub error_breakdown: BTreeMap<String, usize>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    pub(crate) fn new(mode: BatchMode) -> Self {
        Self {
            mode,
            processed: 0,
            succeeded: 0,
            cached: 0,
            failed: 0,
            skipped_reason: None,
            throttled: false,
            cancelled: false,
            duration_seconds: 0.0,
            errors: Vec::new(),
            error_breakdown: BTreeMap::new(),
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn skipped(mode: BatchMode, reason: impl Into<String>, started: Instant) -> Self {
        let mut outcome = Self::new(mode);
        outcome.skipped_reason = Some(reason.into());
        outcome.duration_seconds = started.elapsed().as_secs_f64();
        outcome
    }

    /// Records an error string, dropping it once the cap is reached.
    pub(crate) fn push_error(&mut self, message: &str) {
        if self.errors.len() < MAX_OUTCOME_ERRORS {
            self.errors.push(sanitize_and_truncate_error_message(message));
        }
    }

    pub(crate) fn finish(&mut self, started: Instant, stats: &ProcessingStats) {
        self.duration_seconds = started.elapsed().as_secs_f64();
        self.error_breakdown = stats.breakdown();
        self.finished_at = Utc::now();
    }

    /// Items that reached a coordinate, fresh or cached.
    pub fn resolved(&self) -> usize {
        self.succeeded + self.cached
    }

    pub(crate) fn audit_status(&self) -> AuditStatus {
        if self.skipped_reason.is_some() {
            AuditStatus::Info
        } else if self.processed > 0 && self.failed == self.processed {
            AuditStatus::Error
        } else if self.failed > 0 || self.throttled || self.cancelled {
            AuditStatus::Warning
        } else {
            AuditStatus::Success
        }
    }

    /// One-line summary for logs and the audit trail.
    pub fn summary(&self) -> String {
        let mode = match self.mode {
            BatchMode::Forward => "Batch",
            BatchMode::Retry => "Retry pass",
        };
        if let Some(reason) = &self.skipped_reason {
            return format!("{mode} skipped: {reason}");
        }
        let mut line = format!(
            "{mode} processed {} target{} ({} resolved, {} cached, {} failed) in {:.1}s",
            self.processed,
            if self.processed == 1 { "" } else { "s" },
            self.succeeded,
            self.cached,
            self.failed,
            self.duration_seconds
        );
        if self.throttled {
            line.push_str(", stopped by provider quota");
        }
        if self.cancelled {
            line.push_str(", cancelled");
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_list_is_capped() {
        let mut outcome = BatchOutcome::new(BatchMode::Forward);
        for i in 0..(MAX_OUTCOME_ERRORS + 10) {
            outcome.push_error(&format!("error {i}"));
        }
        assert_eq!(outcome.errors.len(), MAX_OUTCOME_ERRORS);
        assert_eq!(outcome.errors[0], "error 0");
    }

    #[test]
    fn test_audit_status() {
        let mut outcome = BatchOutcome::new(BatchMode::Forward);
        assert_eq!(outcome.audit_status(), AuditStatus::Success);

        outcome.processed = 2;
        outcome.succeeded = 1;
        outcome.failed = 1;
        assert_eq!(outcome.audit_status(), AuditStatus::Warning);

        outcome.succeeded = 0;
        outcome.failed = 2;
        assert_eq!(outcome.audit_status(), AuditStatus::Error);

        let skipped = BatchOutcome::skipped(BatchMode::Retry, "disabled", Instant::now());
        assert_eq!(skipped.audit_status(), AuditStatus::Info);
    }

    #[test]
    fn test_summary() {
        let mut outcome = BatchOutcome::new(BatchMode::Forward);
        outcome.processed = 3;
        outcome.succeeded = 1;
        outcome.cached = 1;
        outcome.failed = 1;
        outcome.throttled = true;
        assert_eq!(
            outcome.summary(),
            "Batch processed 3 targets (1 resolved, 1 cached, 1 failed) in 0.0s, stopped by provider quota"
        );

        let skipped = BatchOutcome::skipped(BatchMode::Forward, "geocoding is disabled", Instant::now());
        assert_eq!(skipped.summary(), "Batch skipped: geocoding is disabled");
    }

    #[test]
    fn test_serializes_for_audit() {
        let outcome = BatchOutcome::new(BatchMode::Retry);
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["mode"], "retry");
        assert_eq!(json["processed"], 0);
        assert!(json["skipped_reason"].is_null());
    }
}
