//! Geocoding cache keyed by normalized city text.
//!
//! Successes and failures share one table. Only successful entries are ever
//! served; failure entries are kept for operators and are overwritten by the
//! next write for the same key.

use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;
use crate::models::{Coordinates, GeocodeSource};
use crate::normalize::NameNormalizer;

/// A stored cache row.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Normalized key
    pub city_key: String,
    /// Cached coordinate, absent for failures
    pub coordinates: Option<Coordinates>,
    /// How the entry was produced
    pub source: GeocodeSource,
    /// Whether the entry records a successful resolution
    pub success: bool,
    /// Write time (ms since epoch)
    pub created_at_ms: i64,
}

/// Returns the cached coordinate for `city`, if a successful entry exists.
pub async fn lookup(
    pool: &SqlitePool,
    normalizer: &NameNormalizer,
    city: &str,
) -> Result<Option<Coordinates>, DatabaseError> {
    let key = normalizer.cache_key(city);
    if key.is_empty() {
        return Ok(None);
    }
    let entry = load_entry(pool, &key).await?;
    Ok(entry
        .filter(|e| e.success)
        .and_then(|e| e.coordinates))
}

/// Writes (or replaces) the entry for `city`'s normalized key.
///
/// A success without coordinates is stored as a failure.
pub async fn store(
    pool: &SqlitePool,
    normalizer: &NameNormalizer,
    city: &str,
    coords: Option<Coordinates>,
    source: GeocodeSource,
    now_ms: i64,
) -> Result<(), DatabaseError> {
    let key = normalizer.cache_key(city);
    if key.is_empty() {
        log::debug!("Not caching '{city}': empty cache key");
        return Ok(());
    }

    sqlx::query(
        "INSERT OR REPLACE INTO geocoding_cache
            (city_key, latitude, longitude, source, success, created_at_ms)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&key)
    .bind(coords.map(|c| c.latitude))
    .bind(coords.map(|c| c.longitude))
    .bind(source.as_str())
    .bind(coords.is_some())
    .bind(now_ms)
    .execute(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    Ok(())
}

/// Loads the raw entry for an already-normalized key.
pub async fn load_entry(
    pool: &SqlitePool,
    city_key: &str,
) -> Result<Option<CacheEntry>, DatabaseError> {
    let row = sqlx::query(
        "SELECT city_key, latitude, longitude, source, success, created_at_ms
         FROM geocoding_cache WHERE city_key = ?",
    )
    .bind(city_key)
    .fetch_optional(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let source: String = row.get("source");
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    Ok(Some(CacheEntry {
        city_key: row.get("city_key"),
        coordinates: latitude.zip(longitude).map(|(lat, lng)| Coordinates::new(lat, lng)),
        source: source.parse().map_err(DatabaseError::InvalidValue)?,
        success: row.get("success"),
        created_at_ms: row.get("created_at_ms"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerTables;
    use crate::storage::test_helpers::create_test_pool;

    fn normalizer() -> NameNormalizer {
        NameNormalizer::new(NormalizerTables::polish())
    }

    #[tokio::test]
    async fn test_store_and_lookup_by_normalized_key() {
        let pool = create_test_pool().await;
        let n = normalizer();
        let coords = Coordinates::new(50.0647, 19.945);

        store(&pool, &n, "Kraków", Some(coords), GeocodeSource::Direct, 1)
            .await
            .expect("store");

        // Same key after prefix, case and diacritic normalization
        assert_eq!(
            lookup(&pool, &n, "  gmina KRAKOW ").await.expect("lookup"),
            Some(coords)
        );
        assert_eq!(lookup(&pool, &n, "Gdańsk").await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn test_failure_entries_are_not_served() {
        let pool = create_test_pool().await;
        let n = normalizer();

        store(&pool, &n, "Nowhereistan", None, GeocodeSource::Failed, 1)
            .await
            .expect("store");

        assert_eq!(lookup(&pool, &n, "Nowhereistan").await.expect("lookup"), None);
        let entry = load_entry(&pool, "nowhereistan")
            .await
            .expect("load")
            .expect("entry exists");
        assert!(!entry.success);
        assert_eq!(entry.source, GeocodeSource::Failed);
    }

    #[tokio::test]
    async fn test_store_replaces_existing_entry() {
        let pool = create_test_pool().await;
        let n = normalizer();
        let coords = Coordinates::new(54.35, 18.65);

        store(&pool, &n, "Gdansk", None, GeocodeSource::Failed, 1)
            .await
            .expect("store failure");
        store(&pool, &n, "Gdańsk", Some(coords), GeocodeSource::Manual, 2)
            .await
            .expect("store success");

        let entry = load_entry(&pool, "gdansk")
            .await
            .expect("load")
            .expect("entry exists");
        assert!(entry.success);
        assert_eq!(entry.source, GeocodeSource::Manual);
        assert_eq!(entry.created_at_ms, 2);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geocoding_cache")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_empty_key_is_never_cached() {
        let pool = create_test_pool().await;
        let n = normalizer();

        store(&pool, &n, "!!!", Some(Coordinates::new(52.0, 20.0)), GeocodeSource::Direct, 1)
            .await
            .expect("store");
        assert_eq!(lookup(&pool, &n, "???").await.expect("lookup"), None);
    }
}
