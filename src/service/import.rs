//! Bulk target ingestion.
//!
//! One target per line: `city` or `city<TAB>title`. Blank lines and lines
//! starting with `#` are skipped.

use serde::Serialize;
use sqlx::SqlitePool;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error_handling::DatabaseError;
use crate::storage;

/// Counts from one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Targets inserted
    pub imported: usize,
    /// Blank, comment or empty-city lines ignored
    pub skipped: usize,
}

/// Parses one input line into `(city, title)`.
pub fn parse_line(line: &str) -> Option<(&str, Option<&str>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (city, title) = match line.split_once('\t') {
        Some((city, title)) => (city.trim(), Some(title.trim()).filter(|t| !t.is_empty())),
        None => (trimmed, None),
    };
    (!city.is_empty()).then_some((city, title))
}

/// Reads targets from `reader` and inserts them with `first_seen_ms = now_ms`.
pub async fn import_targets<R>(
    pool: &SqlitePool,
    reader: R,
    now_ms: i64,
) -> Result<ImportReport, ImportError>
where
    R: AsyncBufRead + Unpin,
{
    let mut report = ImportReport::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Some((city, title)) => {
                storage::targets::insert_target(pool, city, title, now_ms).await?;
                report.imported += 1;
            }
            None => report.skipped += 1,
        }
    }
    log::info!(
        "Imported {} target{} ({} line{} skipped)",
        report.imported,
        if report.imported == 1 { "" } else { "s" },
        report.skipped,
        if report.skipped == 1 { "" } else { "s" }
    );
    Ok(report)
}

/// Failure while importing.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input could not be read.
    #[error("failed to read import input: {0}")]
    Io(#[from] std::io::Error),
    /// A target could not be stored.
    #[error("failed to store target: {0}")]
    Database(#[from] DatabaseError),
}
