//! Batch orchestration.
//!
//! A batch pulls targets from storage and walks them one at a time:
//! cache lookup, resolution chain, write-back, and escalation once a target
//! runs out of attempts. The configured delay is slept between items and the
//! cancellation token is observed between items and during the delay.
//!
//! Only one batch runs per pipeline at a time. Scheduled and manual triggers
//! share the pipeline, so an overlapping trigger gets `PipelineError::Busy`.

mod outcome;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backoff::ProviderBackoff;
use crate::error_handling::{
    update_error_stats, ErrorType, PipelineError, ProcessingStats, ResolveError,
};
use crate::escalation::{now_ms, EscalationTracker};
use crate::models::{GeocodeSource, GeocodeTarget, GeocodingSettings};
use crate::resolve::Resolver;
use crate::storage;

pub use outcome::{BatchMode, BatchOutcome};

/// How a single target ended.
enum ItemResult {
    Cached,
    Resolved,
    Failed(String),
    Throttled(Option<Duration>),
    /// Resolved elsewhere (manual fix) while this item was in flight
    AlreadyResolved,
}

/// The batch worker.
pub struct Pipeline {
    pool: Arc<SqlitePool>,
    resolver: Resolver,
    escalation: EscalationTracker,
    backoff: ProviderBackoff,
    guard: Mutex<()>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a pipeline with a fresh back-off and cancellation token.
    pub fn new(pool: Arc<SqlitePool>, resolver: Resolver, escalation: EscalationTracker) -> Self {
        Self {
            pool,
            resolver,
            escalation,
            backoff: ProviderBackoff::default(),
            guard: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the provider back-off policy.
    pub fn with_backoff(mut self, backoff: ProviderBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Uses `cancel` to stop in-flight batches.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops in-flight batches when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether a batch is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Time left in the provider back-off window, if one is open.
    pub async fn backoff_remaining(&self) -> Option<Duration> {
        self.backoff.remaining().await
    }

    /// Runs a forward batch over pending targets, oldest first.
    ///
    /// `batch_size` overrides the configured size for this run.
    ///
    /// # Errors
    ///
    /// `PipelineError::Busy` if another batch is in flight, and
    /// `PipelineError::Database` if the settings or the batch cannot be loaded.
    pub async fn run(&self, batch_size: Option<u32>) -> Result<BatchOutcome, PipelineError> {
        let _guard = self.guard.try_lock().map_err(|_| PipelineError::Busy)?;
        let started = Instant::now();
        let settings = storage::settings::load(&self.pool).await?;

        if let Some(outcome) = self.precheck(BatchMode::Forward, &settings, started).await {
            return Ok(self.complete(outcome).await);
        }

        let limit = batch_size.unwrap_or(settings.batch_size);
        let targets = storage::targets::fetch_pending(&self.pool, limit, settings.max_attempts).await?;
        info!(
            "Starting batch: {} pending target{} (limit {limit})",
            targets.len(),
            if targets.len() == 1 { "" } else { "s" }
        );

        let outcome = self
            .process_targets(BatchMode::Forward, &targets, &settings, started)
            .await;
        Ok(self.complete(outcome).await)
    }

    /// Re-runs up to `max` escalated targets whose last attempt is older than
    /// the configured retry window.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run`].
    pub async fn retry(&self, max: u32) -> Result<BatchOutcome, PipelineError> {
        let _guard = self.guard.try_lock().map_err(|_| PipelineError::Busy)?;
        let started = Instant::now();
        let settings = storage::settings::load(&self.pool).await?;

        if let Some(outcome) = self.precheck(BatchMode::Retry, &settings, started).await {
            return Ok(self.complete(outcome).await);
        }

        let window_ms = i64::from(settings.retry_failed_after_hours) * 3_600_000;
        let cutoff = now_ms().saturating_sub(window_ms);
        let targets = storage::escalation::list_retryable(&self.pool, cutoff, max).await?;
        info!(
            "Starting retry pass: {} escalated target{} eligible",
            targets.len(),
            if targets.len() == 1 { "" } else { "s" }
        );

        let outcome = self
            .process_targets(BatchMode::Retry, &targets, &settings, started)
            .await;
        Ok(self.complete(outcome).await)
    }

    async fn precheck(
        &self,
        mode: BatchMode,
        settings: &GeocodingSettings,
        started: Instant,
    ) -> Option<BatchOutcome> {
        if !settings.enabled {
            return Some(BatchOutcome::skipped(mode, "geocoding is disabled", started));
        }
        if let Some(left) = self.backoff.remaining().await {
            return Some(BatchOutcome::skipped(
                mode,
                format!("provider back-off active for another {}s", left.as_secs().max(1)),
                started,
            ));
        }
        None
    }

    async fn process_targets(
        &self,
        mode: BatchMode,
        targets: &[GeocodeTarget],
        settings: &GeocodingSettings,
        started: Instant,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::new(mode);
        let stats = ProcessingStats::new();
        let delay = Duration::try_from_secs_f64(settings.delay_seconds).unwrap_or(Duration::ZERO);

        for (index, target) in targets.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                info!(
                    "Cancellation requested, stopping after {} of {} targets",
                    outcome.processed,
                    targets.len()
                );
                outcome.cancelled = true;
                break;
            }

            match self.process_target(target, settings, &stats).await {
                ItemResult::Cached => {
                    outcome.processed += 1;
                    outcome.cached += 1;
                }
                ItemResult::Resolved => {
                    outcome.processed += 1;
                    outcome.succeeded += 1;
                }
                ItemResult::Failed(message) => {
                    outcome.processed += 1;
                    outcome.failed += 1;
                    outcome.push_error(&message);
                }
                ItemResult::AlreadyResolved => {
                    outcome.processed += 1;
                }
                ItemResult::Throttled(retry_after) => {
                    stats.increment_error(ErrorType::ProviderQuota);
                    let wait = self.backoff.record_quota(retry_after).await;
                    outcome.throttled = true;
                    outcome.push_error(&format!(
                        "target {} ({}): provider quota exceeded, backing off {}s",
                        target.id,
                        target.city,
                        wait.as_secs()
                    ));
                    break;
                }
            }
        }

        outcome.finish(started, &stats);
        outcome
    }

    async fn process_target(
        &self,
        target: &GeocodeTarget,
        settings: &GeocodingSettings,
        stats: &ProcessingStats,
    ) -> ItemResult {
        let normalizer = self.resolver.normalizer();
        let bounds = self.resolver.region().bounds;

        match storage::cache::lookup(&self.pool, normalizer, &target.city).await {
            Ok(Some(coords)) if bounds.contains(coords) => {
                debug!("Cache hit for '{}' at {coords}", target.city);
                return match storage::targets::record_success(
                    &self.pool,
                    target.id,
                    coords,
                    GeocodeSource::Cache,
                    now_ms(),
                )
                .await
                {
                    Ok(Some(_)) => ItemResult::Cached,
                    Ok(None) => self.already_resolved(target),
                    Err(e) => {
                        stats.increment_error(ErrorType::DatabaseWrite);
                        ItemResult::Failed(format!(
                            "target {} ({}): failed to write cached coordinate: {e}",
                            target.id, target.city
                        ))
                    }
                };
            }
            Ok(Some(coords)) => {
                warn!(
                    "Ignoring out-of-region cache entry {coords} for '{}'",
                    target.city
                );
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed for '{}': {e}", target.city),
        }

        let resolved = match self.resolver.resolve(&target.city).await {
            Ok(resolved) => resolved,
            Err(ResolveError::Throttled { retry_after }) => {
                return ItemResult::Throttled(retry_after);
            }
        };

        let report = &resolved.report;
        for error in &report.provider_errors {
            update_error_stats(stats, error);
        }
        if report.rejected_out_of_region > 0 {
            stats.increment_error(ErrorType::OutOfRegionCandidate);
        }
        if report.queries > report.provider_errors.len() {
            self.backoff.record_success().await;
        }

        let now = now_ms();
        match &resolved.resolution {
            Some(resolution) => {
                let source = resolution.strategy.source();
                match storage::targets::record_success(
                    &self.pool,
                    target.id,
                    resolution.coordinates,
                    source,
                    now,
                )
                .await
                {
                    Ok(Some(_)) => {}
                    Ok(None) => return self.already_resolved(target),
                    Err(e) => {
                        stats.increment_error(ErrorType::DatabaseWrite);
                        return ItemResult::Failed(format!(
                            "target {} ({}): failed to write coordinate: {e}",
                            target.id, target.city
                        ));
                    }
                }
                if let Err(e) = storage::cache::store(
                    &self.pool,
                    normalizer,
                    &target.city,
                    Some(resolution.coordinates),
                    source,
                    now,
                )
                .await
                {
                    warn!("Failed to cache '{}': {e}", target.city);
                }
                ItemResult::Resolved
            }
            None => {
                stats.increment_error(ErrorType::NoMatch);
                let summary = report.failure_summary();

                let attempts =
                    match storage::targets::record_failure(&self.pool, target.id, now).await {
                        Ok(Some(attempts)) => attempts,
                        Ok(None) => return self.already_resolved(target),
                        Err(e) => {
                            stats.increment_error(ErrorType::DatabaseWrite);
                            return ItemResult::Failed(format!(
                                "target {} ({}): {summary}; failed to record failure: {e}",
                                target.id, target.city
                            ));
                        }
                    };

                if let Err(e) = storage::cache::store(
                    &self.pool,
                    normalizer,
                    &target.city,
                    None,
                    GeocodeSource::Failed,
                    now,
                )
                .await
                {
                    warn!("Failed to cache failure for '{}': {e}", target.city);
                }

                if attempts >= settings.max_attempts {
                    if let Err(e) = self.escalation.escalate(target, attempts, &summary).await {
                        stats.increment_error(ErrorType::DatabaseWrite);
                        warn!("Failed to escalate target {}: {e}", target.id);
                    }
                }

                ItemResult::Failed(format!("target {} ({}): {summary}", target.id, target.city))
            }
        }
    }

    fn already_resolved(&self, target: &GeocodeTarget) -> ItemResult {
        info!(
            "Target {} ({}) was resolved while in flight, keeping existing coordinate",
            target.id, target.city
        );
        ItemResult::AlreadyResolved
    }

    async fn complete(&self, outcome: BatchOutcome) -> BatchOutcome {
        let summary = outcome.summary();
        if outcome.throttled || outcome.failed > 0 {
            warn!("{summary}");
        } else {
            info!("{summary}");
        }

        let data = serde_json::to_value(&outcome).ok();
        if let Err(e) = storage::audit::append(
            &self.pool,
            outcome.mode.audit_kind(),
            outcome.audit_status(),
            &summary,
            data.as_ref(),
            outcome.finished_at.timestamp_millis(),
        )
        .await
        {
            warn!("Failed to record batch audit event: {e}");
        }
        outcome
    }
}
