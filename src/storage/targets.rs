//! Geocode target reads and write-backs.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;
use crate::models::{Coordinates, GeocodeSource, GeocodeTarget, TargetCounts};

pub(crate) const TARGET_COLUMNS: &str = "t.id, t.city, t.title, t.attempts, t.latitude, t.longitude, \
     t.geocoded, t.geocode_source, t.first_seen_ms, t.last_geocoded_ms";

/// Maps a row selected with `TARGET_COLUMNS`.
pub(crate) fn target_from_row(row: &SqliteRow) -> Result<GeocodeTarget, DatabaseError> {
    let attempts: i64 = row.get("attempts");
    let attempts = u32::try_from(attempts)
        .map_err(|_| DatabaseError::InvalidValue(format!("attempts out of range: {attempts}")))?;

    let source = row
        .get::<Option<String>, _>("geocode_source")
        .map(|s| s.parse::<GeocodeSource>())
        .transpose()
        .map_err(DatabaseError::InvalidValue)?;

    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");

    Ok(GeocodeTarget {
        id: row.get("id"),
        city: row.get("city"),
        title: row.get("title"),
        attempts,
        coordinates: latitude.zip(longitude).map(|(lat, lng)| Coordinates::new(lat, lng)),
        geocoded: row.get("geocoded"),
        source,
        first_seen_ms: row.get("first_seen_ms"),
        last_geocoded_ms: row.get("last_geocoded_ms"),
    })
}

/// Inserts a new unresolved target and returns its id.
pub async fn insert_target(
    pool: &SqlitePool,
    city: &str,
    title: Option<&str>,
    first_seen_ms: i64,
) -> Result<i64, DatabaseError> {
    let id = sqlx::query(
        "INSERT INTO geocode_targets (city, title, first_seen_ms) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(city)
    .bind(title)
    .bind(first_seen_ms)
    .fetch_one(pool)
    .await
    .map_err(DatabaseError::SqlError)?
    .get::<i64, _>(0);
    Ok(id)
}

/// Loads one target by id.
pub async fn load_target(
    pool: &SqlitePool,
    target_id: i64,
) -> Result<Option<GeocodeTarget>, DatabaseError> {
    let query = format!("SELECT {TARGET_COLUMNS} FROM geocode_targets t WHERE t.id = ?");
    let row = sqlx::query(&query)
        .bind(target_id)
        .fetch_optional(pool)
        .await
        .map_err(DatabaseError::SqlError)?;
    row.as_ref().map(target_from_row).transpose()
}

/// Fetches up to `limit` unresolved targets below `max_attempts`, oldest first.
pub async fn fetch_pending(
    pool: &SqlitePool,
    limit: u32,
    max_attempts: u32,
) -> Result<Vec<GeocodeTarget>, DatabaseError> {
    let query = format!(
        "SELECT {TARGET_COLUMNS} FROM geocode_targets t
         WHERE t.geocoded = 0 AND t.attempts < ?
         ORDER BY t.first_seen_ms ASC, t.id ASC
         LIMIT ?"
    );
    let rows = sqlx::query(&query)
        .bind(i64::from(max_attempts))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .map_err(DatabaseError::SqlError)?;
    rows.iter().map(target_from_row).collect()
}

/// Writes a verified coordinate and bumps the attempt counter.
///
/// Only unresolved targets are touched. Returns the new attempt count, or
/// `None` if the target is missing or was resolved in the meantime (e.g. by a
/// manual fix).
pub async fn record_success(
    pool: &SqlitePool,
    target_id: i64,
    coords: Coordinates,
    source: GeocodeSource,
    now_ms: i64,
) -> Result<Option<u32>, DatabaseError> {
    let row = sqlx::query(
        "UPDATE geocode_targets
         SET latitude = ?, longitude = ?, geocoded = 1, geocode_source = ?,
             last_geocoded_ms = ?, attempts = attempts + 1
         WHERE id = ? AND geocoded = 0
         RETURNING attempts",
    )
    .bind(coords.latitude)
    .bind(coords.longitude)
    .bind(source.as_str())
    .bind(now_ms)
    .bind(target_id)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::SqlError)?;
    row.map(|row| attempts_from(row.get::<i64, _>(0))).transpose()
}

/// Records a failed attempt: clears coordinates, tags the source `failed`
/// and bumps the attempt counter.
///
/// Same contract as [`record_success`]: a resolved target is left alone and
/// `None` is returned.
pub async fn record_failure(
    pool: &SqlitePool,
    target_id: i64,
    now_ms: i64,
) -> Result<Option<u32>, DatabaseError> {
    let row = sqlx::query(
        "UPDATE geocode_targets
         SET latitude = NULL, longitude = NULL, geocoded = 0, geocode_source = ?,
             last_geocoded_ms = ?, attempts = attempts + 1
         WHERE id = ? AND geocoded = 0
         RETURNING attempts",
    )
    .bind(GeocodeSource::Failed.as_str())
    .bind(now_ms)
    .bind(target_id)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::SqlError)?;
    row.map(|row| attempts_from(row.get::<i64, _>(0))).transpose()
}

/// Counts targets by lifecycle state for the given escalation threshold.
pub async fn counts(pool: &SqlitePool, max_attempts: u32) -> Result<TargetCounts, DatabaseError> {
    let row = sqlx::query(
        "SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN geocoded = 1 THEN 1 ELSE 0 END), 0) AS resolved,
            COALESCE(SUM(CASE WHEN geocoded = 0 AND attempts >= ? THEN 1 ELSE 0 END), 0) AS escalated,
            COALESCE(SUM(CASE WHEN geocoded = 0 AND attempts < ? THEN 1 ELSE 0 END), 0) AS pending
         FROM geocode_targets",
    )
    .bind(i64::from(max_attempts))
    .bind(i64::from(max_attempts))
    .fetch_one(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    let count = |name: &str| -> u64 { row.get::<i64, _>(name).max(0) as u64 };
    Ok(TargetCounts {
        total: count("total"),
        resolved: count("resolved"),
        escalated: count("escalated"),
        pending: count("pending"),
    })
}

/// Time of the most recent successful write, if any.
pub async fn last_geocoded_ms(pool: &SqlitePool) -> Result<Option<i64>, DatabaseError> {
    sqlx::query_scalar("SELECT MAX(last_geocoded_ms) FROM geocode_targets WHERE geocoded = 1")
        .fetch_one(pool)
        .await
        .map_err(DatabaseError::SqlError)
}

fn attempts_from(value: i64) -> Result<u32, DatabaseError> {
    u32::try_from(value)
        .map_err(|_| DatabaseError::InvalidValue(format!("attempts out of range: {value}")))
}
