//! Service facade.
//!
//! `GeocodingService` wires storage, the normalizer, the provider, the resolver,
//! the escalation tracker and the pipeline together. The CLI and the daemon
//! only talk to this type.

mod import;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::app::{print_outcome_statistics, shutdown_gracefully, wait_for_shutdown_signal};
use crate::config::{Config, GeocodingData};
use crate::error_handling::{DatabaseError, ManualFixError, PipelineError, SettingsError};
use crate::escalation::{now_ms, EscalationTracker, ManualFixReport};
use crate::initialization::init_client;
use crate::models::{EscalatedEntry, GeocodingSettings, TargetCounts};
use crate::normalize::NameNormalizer;
use crate::pipeline::{BatchOutcome, Pipeline};
use crate::provider::{GeocodeProvider, NominatimClient};
use crate::resolve::Resolver;
use crate::scheduler::Scheduler;
use crate::storage::{self, init_db_pool_with_path, run_migrations, AuditEvent, AuditKind, AuditStatus};

pub use import::{parse_line, ImportError, ImportReport};
pub use settings::{apply_setting, parse_assignment, SETTING_KEYS};

/// Snapshot returned by the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Targets by lifecycle state
    pub counts: TargetCounts,
    /// Current dynamic settings
    pub settings: GeocodingSettings,
    /// Unresolved escalated entries
    pub escalated_unresolved: u64,
    /// Whether a batch is in flight on this instance
    pub batch_running: bool,
    /// Seconds left in the provider back-off window
    pub backoff_remaining_secs: Option<u64>,
    /// Most recent successful write (ms since epoch)
    pub last_geocoded_ms: Option<i64>,
    /// Country the resolver is restricted to
    pub country_code: String,
}

/// Entry point for every geocoding operation.
pub struct GeocodingService {
    pool: Arc<SqlitePool>,
    pipeline: Arc<Pipeline>,
    escalation: EscalationTracker,
    config: Config,
    country_code: String,
}

impl GeocodingService {
    /// Opens the database, loads the data tables and connects to Nominatim.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or migrated, a data file is
    /// malformed, or the HTTP client cannot be built.
    pub async fn init(config: Config) -> Result<Self> {
        let http = init_client(&config).context("Failed to initialize HTTP client")?;
        let provider =
            NominatimClient::new(http, &config).context("Failed to initialize Nominatim client")?;
        Self::with_provider(config, Arc::new(provider)).await
    }

    /// Same as [`GeocodingService::init`] but with a caller-supplied provider.
    pub async fn with_provider(config: Config, provider: Arc<dyn GeocodeProvider>) -> Result<Self> {
        let data = GeocodingData::load_or_init(&config.data_dir)
            .context("Failed to load geocoding data tables")?;
        let pool = init_db_pool_with_path(&config.db_path)
            .await
            .context("Failed to initialize database pool")?;
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self::from_parts(config, pool, data, provider))
    }

    /// Assembles a service over an already-migrated pool.
    pub fn from_parts(
        config: Config,
        pool: Arc<SqlitePool>,
        data: GeocodingData,
        provider: Arc<dyn GeocodeProvider>,
    ) -> Self {
        let normalizer = Arc::new(NameNormalizer::new(data.tables));
        let bounds = data.region.bounds;
        let country_code = data.region.country_code.clone();
        let resolver = Resolver::new(provider, Arc::clone(&normalizer), data.region);
        let escalation = EscalationTracker::new(Arc::clone(&pool), normalizer, bounds);
        let pipeline = Pipeline::new(Arc::clone(&pool), resolver, escalation.clone());
        Self {
            pool,
            pipeline: Arc::new(pipeline),
            escalation,
            config,
            country_code,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Token that interrupts in-flight batches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.pipeline.cancellation_token()
    }

    /// Runs one forward batch.
    pub async fn run_batch(&self, batch_size: Option<u32>) -> Result<BatchOutcome, PipelineError> {
        let outcome = self.pipeline.run(batch_size).await?;
        print_outcome_statistics(&outcome);
        Ok(outcome)
    }

    /// Runs one retry pass over up to `max` escalated targets.
    pub async fn retry_escalated(&self, max: u32) -> Result<BatchOutcome, PipelineError> {
        let outcome = self.pipeline.retry(max).await?;
        print_outcome_statistics(&outcome);
        Ok(outcome)
    }

    /// Counts, settings and back-off state.
    pub async fn status(&self) -> Result<StatusReport> {
        let settings = storage::settings::load(&self.pool)
            .await
            .context("Failed to load settings")?;
        let counts = storage::targets::counts(&self.pool, settings.max_attempts)
            .await
            .context("Failed to count targets")?;
        let escalated_unresolved = storage::escalation::count_unresolved(&self.pool)
            .await
            .context("Failed to count escalated targets")?;
        let last_geocoded_ms = storage::targets::last_geocoded_ms(&self.pool)
            .await
            .context("Failed to read last geocoding time")?;

        Ok(StatusReport {
            counts,
            settings,
            escalated_unresolved,
            batch_running: self.pipeline.is_busy(),
            backoff_remaining_secs: self
                .pipeline
                .backoff_remaining()
                .await
                .map(|d| d.as_secs().max(1)),
            last_geocoded_ms,
            country_code: self.country_code.clone(),
        })
    }

    /// Unresolved escalated entries, most recent attempt first.
    pub async fn list_escalated(&self, limit: u32) -> Result<Vec<EscalatedEntry>, DatabaseError> {
        self.escalation.list(limit).await
    }

    /// Applies an operator coordinate.
    pub async fn manual_fix(
        &self,
        target_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<ManualFixReport, ManualFixError> {
        self.escalation
            .manual_resolve(target_id, latitude, longitude)
            .await
    }

    /// Stores an operator suggestion on an escalated target.
    pub async fn suggest(
        &self,
        target_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<EscalatedEntry, ManualFixError> {
        self.escalation.suggest(target_id, latitude, longitude).await
    }

    /// Resolves an escalated target with its stored suggestion.
    pub async fn accept_suggestion(&self, target_id: i64) -> Result<ManualFixReport, ManualFixError> {
        self.escalation.accept_suggestion(target_id).await
    }

    /// Current dynamic settings.
    pub async fn settings(&self) -> Result<GeocodingSettings, DatabaseError> {
        storage::settings::load(&self.pool).await
    }

    /// Validates and persists one setting change.
    pub async fn update_settings(
        &self,
        key: &str,
        value: &str,
    ) -> Result<GeocodingSettings, SettingsError> {
        let mut settings = storage::settings::load(&self.pool).await?;
        let before = settings.clone();
        apply_setting(&mut settings, key, value)?;

        let now = now_ms();
        storage::settings::update(&self.pool, &settings, now).await?;
        info!("Setting {key} changed to {value}");

        let data = serde_json::json!({ "before": before, "after": settings });
        if let Err(e) = storage::audit::append(
            &self.pool,
            AuditKind::Settings,
            AuditStatus::Info,
            &format!("{} set to {}", key.trim(), value.trim()),
            Some(&data),
            now,
        )
        .await
        {
            warn!("Failed to record settings audit event: {e}");
        }
        Ok(settings)
    }

    /// Audit events, newest first.
    pub async fn recent_events(&self, limit: Option<usize>) -> Result<Vec<AuditEvent>, DatabaseError> {
        storage::audit::recent(&self.pool, limit).await
    }

    /// Inserts targets read line by line from `reader`.
    pub async fn import_targets<R>(&self, reader: R) -> Result<ImportReport, ImportError>
    where
        R: AsyncBufRead + Unpin,
    {
        import::import_targets(&self.pool, reader, now_ms()).await
    }

    /// Runs scheduled batches until Ctrl-C.
    ///
    /// An overlapping trigger (a manual batch against the same instance) is
    /// logged and skipped.
    pub async fn run_daemon(&self) -> Result<()> {
        let interval = self.config.schedule_interval();
        if interval.is_zero() {
            anyhow::bail!("schedule interval must be greater than zero");
        }
        let cancel = self.cancellation_token();
        let handle = self.spawn_scheduler(interval, cancel.clone());
        info!(
            "Scheduler started: every {}s, first batch at {}",
            interval.as_secs(),
            handle.next_fire_time().await.to_rfc3339()
        );

        tokio::select! {
            _ = wait_for_shutdown_signal() => {}
            _ = cancel.cancelled() => {}
        }
        shutdown_gracefully(cancel, Some(handle)).await;
        Ok(())
    }

    fn spawn_scheduler(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> crate::scheduler::SchedulerHandle {
        let pipeline = Arc::clone(&self.pipeline);
        Scheduler::new(interval).spawn(cancel, move || {
            let pipeline = Arc::clone(&pipeline);
            async move {
                match pipeline.run(None).await {
                    Ok(outcome) => print_outcome_statistics(&outcome),
                    Err(PipelineError::Busy) => {
                        warn!("Scheduled batch skipped: another batch is still running")
                    }
                    Err(e) => log::error!("Scheduled batch failed: {e}"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::provider::mock::ScriptedProvider;
    use crate::storage::test_helpers::{create_test_pool, create_test_target, set_test_settings};

    async fn service(provider: ScriptedProvider) -> GeocodingService {
        let pool = Arc::new(create_test_pool().await);
        set_test_settings(&pool, 3).await;
        GeocodingService::from_parts(
            Config::default(),
            pool,
            GeocodingData::default(),
            Arc::new(provider),
        )
    }

    #[tokio::test]
    async fn test_status_reflects_batch() {
        let service = service(ScriptedProvider::matching(
            "warszawa",
            Coordinates::new(52.2297, 21.0122),
        ))
        .await;
        create_test_target(service.pool(), "Warszawa", 1).await;
        create_test_target(service.pool(), "Nowhereistan", 2).await;

        let outcome = service.run_batch(None).await.expect("batch");
        assert_eq!(outcome.processed, 2);

        let status = service.status().await.expect("status");
        assert_eq!(status.counts.total, 2);
        assert_eq!(status.counts.resolved, 1);
        assert_eq!(status.counts.pending, 1);
        assert_eq!(status.escalated_unresolved, 0);
        assert!(!status.batch_running);
        assert_eq!(status.backoff_remaining_secs, None);
        assert!(status.last_geocoded_ms.is_some());
        assert_eq!(status.country_code, "pl");
    }

    #[tokio::test]
    async fn test_update_settings_persists_and_audits() {
        let service = service(ScriptedProvider::empty()).await;

        let updated = service
            .update_settings("batch_size", "7")
            .await
            .expect("update");
        assert_eq!(updated.batch_size, 7);
        assert_eq!(service.settings().await.expect("settings").batch_size, 7);

        let events = service.recent_events(Some(1)).await.expect("events");
        assert_eq!(events[0].kind, "settings");
        assert_eq!(events[0].message, "batch_size set to 7");
    }

    #[tokio::test]
    async fn test_update_settings_rejects_bad_value_without_writing() {
        let service = service(ScriptedProvider::empty()).await;

        assert!(matches!(
            service.update_settings("max_attempts", "0").await,
            Err(SettingsError::InvalidValue { .. })
        ));
        assert_eq!(service.settings().await.expect("settings").max_attempts, 3);
        assert!(service.recent_events(None).await.expect("events").is_empty());
    }

    #[tokio::test]
    async fn test_disabled_service_skips_batches() {
        let service = service(ScriptedProvider::empty()).await;
        service
            .update_settings("enabled", "false")
            .await
            .expect("disable");

        let outcome = service.run_batch(None).await.expect("batch");
        assert!(outcome.skipped_reason.is_some());
        let retry = service.retry_escalated(10).await.expect("retry");
        assert!(retry.skipped_reason.is_some());
    }

    #[tokio::test]
    async fn test_import_then_fix_flow() {
        let service = service(ScriptedProvider::empty()).await;
        let report = service
            .import_targets("Nowhereistan\tDom\n".as_bytes())
            .await
            .expect("import");
        assert_eq!(report.imported, 1);

        for _ in 0..3 {
            service.run_batch(None).await.expect("batch");
        }
        let escalated = service.list_escalated(10).await.expect("list");
        assert_eq!(escalated.len(), 1);
        let target_id = escalated[0].target_id;

        service
            .suggest(target_id, 50.06, 19.94)
            .await
            .expect("suggest");
        let fix = service.accept_suggestion(target_id).await.expect("accept");
        assert!(fix.escalation_resolved);
        assert!(service.list_escalated(10).await.expect("list").is_empty());

        let status = service.status().await.expect("status");
        assert_eq!(status.counts.resolved, 1);
        assert_eq!(status.counts.escalated, 0);
    }
}
