//! Audit trail of batch runs and operator actions.
//!
//! Events are append-only and readable through `recent` for the `history`
//! command.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;

/// What produced an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// Forward batch
    Batch,
    /// Retry pass over escalated targets
    Retry,
    /// Operator coordinate fix
    ManualFix,
    /// Operator suggestion
    Suggestion,
    /// Settings change
    Settings,
}

impl AuditKind {
    /// Tag stored in SQL.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Batch => "batch",
            AuditKind::Retry => "retry",
            AuditKind::ManualFix => "manual_fix",
            AuditKind::Suggestion => "suggestion",
            AuditKind::Settings => "settings",
        }
    }
}

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Warning,
    Error,
    Info,
}

impl AuditStatus {
    /// Tag stored in SQL.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Warning => "warning",
            AuditStatus::Error => "error",
            AuditStatus::Info => "info",
        }
    }
}

/// A stored audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Row id
    pub id: i64,
    /// Event time (ms since epoch)
    pub timestamp_ms: i64,
    /// Event kind tag
    pub kind: String,
    /// Status tag
    pub status: String,
    /// Human-readable summary
    pub message: String,
    /// JSON payload, if any
    pub data: Option<String>,
}

/// Appends an event and returns its id.
pub async fn append(
    pool: &SqlitePool,
    kind: AuditKind,
    status: AuditStatus,
    message: &str,
    data: Option<&serde_json::Value>,
    timestamp_ms: i64,
) -> Result<i64, DatabaseError> {
    let data = data.map(|value| value.to_string());
    let id = sqlx::query(
        "INSERT INTO geocoding_events (timestamp_ms, kind, status, message, data)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(timestamp_ms)
    .bind(kind.as_str())
    .bind(status.as_str())
    .bind(message)
    .bind(data)
    .fetch_one(pool)
    .await
    .map_err(DatabaseError::SqlError)?
    .get::<i64, _>("id");
    Ok(id)
}

/// Returns events newest first, optionally limited.
pub async fn recent(
    pool: &SqlitePool,
    limit: Option<usize>,
) -> Result<Vec<AuditEvent>, DatabaseError> {
    let query = if let Some(limit) = limit {
        format!(
            "SELECT id, timestamp_ms, kind, status, message, data
             FROM geocoding_events
             ORDER BY timestamp_ms DESC, id DESC
             LIMIT {}",
            limit
        )
    } else {
        "SELECT id, timestamp_ms, kind, status, message, data
         FROM geocoding_events
         ORDER BY timestamp_ms DESC, id DESC"
            .to_string()
    };

    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::SqlError)?;

    Ok(rows
        .into_iter()
        .map(|row| AuditEvent {
            id: row.get("id"),
            timestamp_ms: row.get("timestamp_ms"),
            kind: row.get("kind"),
            status: row.get("status"),
            message: row.get("message"),
            data: row.get("data"),
        })
        .collect())
}
