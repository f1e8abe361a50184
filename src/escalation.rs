//! Failure escalation and operator fixes.
//!
//! Targets that exhaust their automated attempts land in `escalated_targets`.
//! Operators can list them, attach a suggested coordinate, accept that
//! suggestion or supply a coordinate directly. A manual fix is the only path
//! that marks an entry resolved.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error_handling::{DatabaseError, ManualFixError};
use crate::models::{Coordinates, EscalatedEntry, GeocodeSource, GeocodeTarget};
use crate::normalize::NameNormalizer;
use crate::region::RegionBounds;
use crate::storage::{self, AuditKind, AuditStatus};
use crate::utils::sanitize_and_truncate_error_message;

/// Result of a successful manual fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualFixReport {
    /// Fixed target
    pub target_id: i64,
    /// Coordinate written
    pub coordinates: Coordinates,
    /// Whether an unresolved escalated entry was cleared by this fix
    pub escalation_resolved: bool,
}

/// Escalation bookkeeping over one database.
#[derive(Clone)]
pub struct EscalationTracker {
    pool: Arc<SqlitePool>,
    normalizer: Arc<NameNormalizer>,
    bounds: RegionBounds,
}

impl EscalationTracker {
    /// Creates a tracker validating fixes against `bounds`.
    pub fn new(pool: Arc<SqlitePool>, normalizer: Arc<NameNormalizer>, bounds: RegionBounds) -> Self {
        Self {
            pool,
            normalizer,
            bounds,
        }
    }

    /// Records (or refreshes) the escalated entry for `target`.
    pub async fn escalate(
        &self,
        target: &GeocodeTarget,
        attempts: u32,
        error: &str,
    ) -> Result<(), DatabaseError> {
        let message = sanitize_and_truncate_error_message(error);
        storage::escalation::upsert(&self.pool, target, attempts, &message, now_ms()).await?;
        warn!(
            "Escalated target {} ('{}') after {attempts} attempts: {message}",
            target.id, target.city
        );
        Ok(())
    }

    /// Unresolved entries, most recent attempt first.
    pub async fn list(&self, limit: u32) -> Result<Vec<EscalatedEntry>, DatabaseError> {
        storage::escalation::list_unresolved(&self.pool, limit).await
    }

    /// Writes an operator coordinate to `target_id` and resolves its entry.
    ///
    /// The coordinate is validated against the region first; a rejected fix
    /// changes nothing. The fix is also cached so later targets with the same
    /// normalized city are served from it.
    pub async fn manual_resolve(
        &self,
        target_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<ManualFixReport, ManualFixError> {
        let coordinates = self.validate(latitude, longitude)?;
        let now = now_ms();

        let escalation_resolved =
            storage::escalation::mark_resolved_with_fix(&self.pool, target_id, coordinates, now)
                .await?
                .ok_or(ManualFixError::UnknownTarget(target_id))?;

        if let Some(target) = storage::targets::load_target(&self.pool, target_id).await? {
            storage::cache::store(
                &self.pool,
                &self.normalizer,
                &target.city,
                Some(coordinates),
                GeocodeSource::Manual,
                now,
            )
            .await?;
        }

        info!("Manual fix for target {target_id}: {coordinates}");
        let report = ManualFixReport {
            target_id,
            coordinates,
            escalation_resolved,
        };
        self.audit(
            AuditKind::ManualFix,
            &format!("Target {target_id} fixed manually at {coordinates}"),
            &report,
            now,
        )
        .await;
        Ok(report)
    }

    /// Stores a suggested coordinate on an unresolved entry without resolving it.
    pub async fn suggest(
        &self,
        target_id: i64,
        latitude: f64,
        longitude: f64,
    ) -> Result<EscalatedEntry, ManualFixError> {
        let coordinates = self.validate(latitude, longitude)?;

        if !storage::escalation::suggest(&self.pool, target_id, coordinates).await? {
            return Err(self.missing_entry_error(target_id).await?);
        }

        let entry = storage::escalation::load(&self.pool, target_id)
            .await?
            .ok_or(ManualFixError::NotEscalated(target_id))?;
        info!("Suggestion stored for target {target_id}: {coordinates}");
        self.audit(
            AuditKind::Suggestion,
            &format!("Suggested {coordinates} for target {target_id}"),
            &entry,
            now_ms(),
        )
        .await;
        Ok(entry)
    }

    /// Resolves an entry with its stored suggestion.
    pub async fn accept_suggestion(&self, target_id: i64) -> Result<ManualFixReport, ManualFixError> {
        let entry = match storage::escalation::load(&self.pool, target_id).await? {
            Some(entry) if !entry.resolved => entry,
            _ => return Err(self.missing_entry_error(target_id).await?),
        };
        let suggested = entry
            .suggested
            .ok_or(ManualFixError::NoSuggestion(target_id))?;
        self.manual_resolve(target_id, suggested.latitude, suggested.longitude)
            .await
    }

    fn validate(&self, latitude: f64, longitude: f64) -> Result<Coordinates, ManualFixError> {
        let coordinates = Coordinates::new(latitude, longitude);
        if self.bounds.contains(coordinates) {
            Ok(coordinates)
        } else {
            Err(ManualFixError::OutOfRegion {
                latitude,
                longitude,
            })
        }
    }

    async fn missing_entry_error(&self, target_id: i64) -> Result<ManualFixError, ManualFixError> {
        Ok(
            match storage::targets::load_target(&self.pool, target_id).await? {
                Some(_) => ManualFixError::NotEscalated(target_id),
                None => ManualFixError::UnknownTarget(target_id),
            },
        )
    }

    // Audit failures are logged, never surfaced: the fix itself is committed.
    async fn audit<T: Serialize>(&self, kind: AuditKind, message: &str, data: &T, now: i64) {
        let data = serde_json::to_value(data).ok();
        if let Err(e) = storage::audit::append(
            &self.pool,
            kind,
            AuditStatus::Info,
            message,
            data.as_ref(),
            now,
        )
        .await
        {
            warn!("Failed to record audit event: {e}");
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
