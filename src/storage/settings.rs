//! The single-row dynamic settings record.

use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;
use crate::models::GeocodingSettings;

/// Loads the settings row seeded by the migrations.
pub async fn load(pool: &SqlitePool) -> Result<GeocodingSettings, DatabaseError> {
    let row = sqlx::query(
        "SELECT enabled, batch_size, delay_seconds, max_attempts, retry_failed_after_hours
         FROM geocoding_settings WHERE id = 1",
    )
    .fetch_one(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    let to_u32 = |name: &str| -> Result<u32, DatabaseError> {
        let value: i64 = row.get(name);
        u32::try_from(value)
            .map_err(|_| DatabaseError::InvalidValue(format!("{name} out of range: {value}")))
    };

    Ok(GeocodingSettings {
        enabled: row.get("enabled"),
        batch_size: to_u32("batch_size")?,
        delay_seconds: row.get("delay_seconds"),
        max_attempts: to_u32("max_attempts")?,
        retry_failed_after_hours: to_u32("retry_failed_after_hours")?,
    })
}

/// Overwrites the settings row.
pub async fn update(
    pool: &SqlitePool,
    settings: &GeocodingSettings,
    now_ms: i64,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "UPDATE geocoding_settings
         SET enabled = ?, batch_size = ?, delay_seconds = ?, max_attempts = ?,
             retry_failed_after_hours = ?, updated_at_ms = ?
         WHERE id = 1",
    )
    .bind(settings.enabled)
    .bind(i64::from(settings.batch_size))
    .bind(settings.delay_seconds)
    .bind(i64::from(settings.max_attempts))
    .bind(i64::from(settings.retry_failed_after_hours))
    .bind(now_ms)
    .execute(pool)
    .await
    .map_err(DatabaseError::SqlError)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::create_test_pool;

    #[tokio::test]
    async fn test_load_seeded_defaults() {
        let pool = create_test_pool().await;
        let settings = load(&pool).await.expect("load");
        assert_eq!(settings, GeocodingSettings::default());
    }

    #[tokio::test]
    async fn test_update_round_trips() {
        let pool = create_test_pool().await;
        let changed = GeocodingSettings {
            enabled: false,
            batch_size: 10,
            delay_seconds: 2.5,
            max_attempts: 5,
            retry_failed_after_hours: 0,
        };
        update(&pool, &changed, 1_000).await.expect("update");
        assert_eq!(load(&pool).await.expect("load"), changed);
    }

    #[tokio::test]
    async fn test_update_rejects_values_violating_checks() {
        let pool = create_test_pool().await;
        let invalid = GeocodingSettings {
            batch_size: 0,
            ..GeocodingSettings::default()
        };
        assert!(update(&pool, &invalid, 1).await.is_err());
        assert_eq!(load(&pool).await.expect("load"), GeocodingSettings::default());
    }
}
