//! Escalated-target persistence.
//!
//! One row per target (`target_id` is unique). Automated writes only touch
//! unresolved rows; the manual fix transaction is the only path that marks a
//! row resolved.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;
use crate::models::{Coordinates, EscalatedEntry, GeocodeSource, GeocodeTarget};

const ENTRY_COLUMNS: &str = "e.id, e.target_id, e.city, e.title, e.attempts, e.last_attempt_ms, \
     e.error_message, e.suggested_latitude, e.suggested_longitude, e.resolved, \
     e.created_at_ms, e.resolved_at_ms, t.geocoded AS target_geocoded";

fn entry_from_row(row: &SqliteRow) -> Result<EscalatedEntry, DatabaseError> {
    let attempts: i64 = row.get("attempts");
    let suggested_lat: Option<f64> = row.get("suggested_latitude");
    let suggested_lng: Option<f64> = row.get("suggested_longitude");
    Ok(EscalatedEntry {
        id: row.get("id"),
        target_id: row.get("target_id"),
        city: row.get("city"),
        title: row.get("title"),
        attempts: u32::try_from(attempts).map_err(|_| {
            DatabaseError::InvalidValue(format!("attempts out of range: {attempts}"))
        })?,
        last_attempt_ms: row.get("last_attempt_ms"),
        error_message: row.get("error_message"),
        suggested: suggested_lat
            .zip(suggested_lng)
            .map(|(lat, lng)| Coordinates::new(lat, lng)),
        resolved: row.get("resolved"),
        target_geocoded: row.get::<Option<bool>, _>("target_geocoded").unwrap_or(false),
        created_at_ms: row.get("created_at_ms"),
        resolved_at_ms: row.get("resolved_at_ms"),
    })
}

/// Creates the entry for `target` or refreshes it while it is unresolved.
///
/// A resolved entry is left untouched.
pub async fn upsert(
    pool: &SqlitePool,
    target: &GeocodeTarget,
    attempts: u32,
    error_message: &str,
    now_ms: i64,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO escalated_targets
            (target_id, city, title, attempts, last_attempt_ms, error_message, created_at_ms)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(target_id) DO UPDATE SET
             city = excluded.city,
             title = excluded.title,
             attempts = excluded.attempts,
             last_attempt_ms = excluded.last_attempt_ms,
             error_message = excluded.error_message
         WHERE escalated_targets.resolved = 0",
    )
    .bind(target.id)
    .bind(&target.city)
    .bind(target.title.as_deref())
    .bind(i64::from(attempts))
    .bind(now_ms)
    .bind(error_message)
    .bind(now_ms)
    .execute(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    Ok(())
}

/// Unresolved entries, most recent attempt first.
pub async fn list_unresolved(
    pool: &SqlitePool,
    limit: u32,
) -> Result<Vec<EscalatedEntry>, DatabaseError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS}
         FROM escalated_targets e
         LEFT JOIN geocode_targets t ON t.id = e.target_id
         WHERE e.resolved = 0
         ORDER BY e.last_attempt_ms DESC, e.id DESC
         LIMIT ?"
    );
    let rows = sqlx::query(&query)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::SqlError)?;
    rows.iter().map(entry_from_row).collect()
}

/// Targets eligible for a retry pass: escalated, unresolved, not geocoded
/// since, and last attempted at or before `cutoff_ms`. Oldest attempt first.
pub async fn list_retryable(
    pool: &SqlitePool,
    cutoff_ms: i64,
    limit: u32,
) -> Result<Vec<GeocodeTarget>, DatabaseError> {
    let query = format!(
        "SELECT {}
         FROM escalated_targets e
         JOIN geocode_targets t ON t.id = e.target_id
         WHERE e.resolved = 0 AND t.geocoded = 0 AND e.last_attempt_ms <= ?
         ORDER BY e.last_attempt_ms ASC, e.id ASC
         LIMIT ?",
        super::targets::TARGET_COLUMNS
    );
    let rows = sqlx::query(&query)
        .bind(cutoff_ms)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::SqlError)?;
    rows.iter().map(super::targets::target_from_row).collect()
}

/// Number of entries still awaiting an operator.
pub async fn count_unresolved(pool: &SqlitePool) -> Result<u64, DatabaseError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM escalated_targets WHERE resolved = 0")
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::SqlError)?;
    u64::try_from(count)
        .map_err(|_| DatabaseError::InvalidValue(format!("negative count: {count}")))
}

/// Loads the entry for `target_id`, resolved or not.
pub async fn load(
    pool: &SqlitePool,
    target_id: i64,
) -> Result<Option<EscalatedEntry>, DatabaseError> {
    let query = format!(
        "SELECT {ENTRY_COLUMNS}
         FROM escalated_targets e
         LEFT JOIN geocode_targets t ON t.id = e.target_id
         WHERE e.target_id = ?"
    );
    let row = sqlx::query(&query)
        .bind(target_id)
        .fetch_optional(pool)
        .await
        .map_err(DatabaseError::SqlError)?;
    row.as_ref().map(entry_from_row).transpose()
}

/// Stores an operator suggestion on an unresolved entry.
///
/// Returns `false` when there is no unresolved entry for the target.
pub async fn suggest(
    pool: &SqlitePool,
    target_id: i64,
    coords: Coordinates,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        "UPDATE escalated_targets
         SET suggested_latitude = ?, suggested_longitude = ?
         WHERE target_id = ? AND resolved = 0",
    )
    .bind(coords.latitude)
    .bind(coords.longitude)
    .bind(target_id)
    .execute(pool)
    .await
    .map_err(DatabaseError::SqlError)?;
    Ok(result.rows_affected() > 0)
}

/// Writes a manual coordinate to the target and resolves its entry in one
/// transaction.
///
/// Returns `None` when the target does not exist (nothing is written), and
/// otherwise whether an unresolved escalated entry was cleared.
pub async fn mark_resolved_with_fix(
    pool: &SqlitePool,
    target_id: i64,
    coords: Coordinates,
    now_ms: i64,
) -> Result<Option<bool>, DatabaseError> {
    let mut tx = pool.begin().await.map_err(DatabaseError::SqlError)?;

    let updated = sqlx::query(
        "UPDATE geocode_targets
         SET latitude = ?, longitude = ?, geocoded = 1, geocode_source = ?, last_geocoded_ms = ?
         WHERE id = ?",
    )
    .bind(coords.latitude)
    .bind(coords.longitude)
    .bind(GeocodeSource::Manual.as_str())
    .bind(now_ms)
    .bind(target_id)
    .execute(&mut *tx)
    .await
    .map_err(DatabaseError::SqlError)?;

    if updated.rows_affected() == 0 {
        tx.rollback().await.map_err(DatabaseError::SqlError)?;
        return Ok(None);
    }

    let resolved = sqlx::query(
        "UPDATE escalated_targets
         SET resolved = 1, resolved_at_ms = ?
         WHERE target_id = ? AND resolved = 0",
    )
    .bind(now_ms)
    .bind(target_id)
    .execute(&mut *tx)
    .await
    .map_err(DatabaseError::SqlError)?;

    tx.commit().await.map_err(DatabaseError::SqlError)?;
    Ok(Some(resolved.rows_affected() > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::targets::{load_target, record_success};
    use crate::storage::test_helpers::{create_test_pool, create_test_target};

    async fn escalated_target(pool: &SqlitePool, city: &str, attempt_ms: i64) -> GeocodeTarget {
        let id = create_test_target(pool, city, 1).await;
        let target = load_target(pool, id).await.expect("load").expect("exists");
        upsert(pool, &target, 3, "no match", attempt_ms)
            .await
            .expect("upsert");
        target
    }

    #[tokio::test]
    async fn test_upsert_never_duplicates() {
        let pool = create_test_pool().await;
        let target = escalated_target(&pool, "Nowhereistan", 100).await;

        upsert(&pool, &target, 4, "still no match", 200)
            .await
            .expect("second upsert");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM escalated_targets")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 1);

        let entry = load(&pool, target.id).await.expect("load").expect("exists");
        assert_eq!(entry.attempts, 4);
        assert_eq!(entry.last_attempt_ms, 200);
        assert_eq!(entry.created_at_ms, 100);
        assert_eq!(entry.error_message.as_deref(), Some("still no match"));
        assert!(!entry.resolved);
    }

    #[tokio::test]
    async fn test_upsert_leaves_resolved_entry_alone() {
        let pool = create_test_pool().await;
        let target = escalated_target(&pool, "Nowhereistan", 100).await;
        mark_resolved_with_fix(&pool, target.id, Coordinates::new(52.0, 20.0), 150)
            .await
            .expect("fix");

        upsert(&pool, &target, 9, "late failure", 300)
            .await
            .expect("upsert");

        let entry = load(&pool, target.id).await.expect("load").expect("exists");
        assert!(entry.resolved);
        assert_eq!(entry.attempts, 3);
        assert_eq!(entry.resolved_at_ms, Some(150));
    }

    #[tokio::test]
    async fn test_list_unresolved_most_recent_first() {
        let pool = create_test_pool().await;
        let older = escalated_target(&pool, "Aaa", 100).await;
        let newer = escalated_target(&pool, "Bbb", 500).await;
        let fixed = escalated_target(&pool, "Ccc", 900).await;
        mark_resolved_with_fix(&pool, fixed.id, Coordinates::new(52.0, 20.0), 950)
            .await
            .expect("fix");

        let entries = list_unresolved(&pool, 10).await.expect("list");
        let ids: Vec<i64> = entries.iter().map(|e| e.target_id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        assert_eq!(list_unresolved(&pool, 1).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_list_retryable_respects_cutoff_and_geocoded_targets() {
        let pool = create_test_pool().await;
        let stale = escalated_target(&pool, "Stale", 100).await;
        let _fresh = escalated_target(&pool, "Fresh", 10_000).await;
        let recovered = escalated_target(&pool, "Recovered", 50).await;
        record_success(&pool, recovered.id, Coordinates::new(52.0, 20.0), GeocodeSource::Direct, 60)
            .await
            .expect("resolve");

        let retryable = list_retryable(&pool, 5_000, 10).await.expect("retryable");
        let ids: Vec<i64> = retryable.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![stale.id]);

        let listed = list_unresolved(&pool, 10).await.expect("list");
        let recovered_entry = listed
            .iter()
            .find(|e| e.target_id == recovered.id)
            .expect("still listed");
        assert!(recovered_entry.target_geocoded);
    }

    #[tokio::test]
    async fn test_count_unresolved_skips_resolved_entries() {
        let pool = create_test_pool().await;
        assert_eq!(count_unresolved(&pool).await.expect("count"), 0);

        let open = escalated_target(&pool, "Open", 100).await;
        let fixed = escalated_target(&pool, "Fixed", 100).await;
        mark_resolved_with_fix(&pool, fixed.id, Coordinates::new(52.0, 20.0), 200)
            .await
            .expect("fix");

        assert_eq!(count_unresolved(&pool).await.expect("count"), 1);
        assert!(!load(&pool, open.id).await.expect("load").expect("exists").resolved);
    }

    #[tokio::test]
    async fn test_suggest_requires_unresolved_entry() {
        let pool = create_test_pool().await;
        let target = escalated_target(&pool, "Nowhereistan", 100).await;
        let coords = Coordinates::new(51.1, 17.03);

        assert!(suggest(&pool, target.id, coords).await.expect("suggest"));
        let entry = load(&pool, target.id).await.expect("load").expect("exists");
        assert_eq!(entry.suggested, Some(coords));
        assert!(!entry.resolved);

        assert!(!suggest(&pool, target.id + 1, coords).await.expect("suggest"));
    }

    #[tokio::test]
    async fn test_mark_resolved_with_fix_unknown_target_writes_nothing() {
        let pool = create_test_pool().await;
        let result = mark_resolved_with_fix(&pool, 77, Coordinates::new(52.0, 20.0), 1)
            .await
            .expect("fix");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_mark_resolved_with_fix_writes_target() {
        let pool = create_test_pool().await;
        let target = escalated_target(&pool, "Nowhereistan", 100).await;
        let coords = Coordinates::new(52.1, 21.0);

        let cleared = mark_resolved_with_fix(&pool, target.id, coords, 200)
            .await
            .expect("fix");
        assert_eq!(cleared, Some(true));

        let fixed = load_target(&pool, target.id).await.expect("load").expect("exists");
        assert!(fixed.geocoded);
        assert_eq!(fixed.coordinates, Some(coords));
        assert_eq!(fixed.source, Some(GeocodeSource::Manual));
        assert!(list_unresolved(&pool, 10).await.expect("list").is_empty());
    }
}
