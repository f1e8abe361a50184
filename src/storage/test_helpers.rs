//! Shared test helpers for storage and pipeline tests.
//!
//! This module provides common utilities for database setup and test data creation.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::storage::run_migrations;

/// Creates a test database pool with migrations applied.
///
/// Uses an in-memory database on a single connection so every query sees the
/// same database.
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Inserts a target and returns its id.
pub async fn create_test_target(pool: &SqlitePool, city: &str, first_seen_ms: i64) -> i64 {
    crate::storage::targets::insert_target(pool, city, Some("Test listing"), first_seen_ms)
        .await
        .expect("Failed to insert test target")
}

/// Forces a target's attempt counter, bypassing the pipeline.
pub async fn set_attempts(pool: &SqlitePool, target_id: i64, attempts: u32) {
    sqlx::query("UPDATE geocode_targets SET attempts = ? WHERE id = ?")
        .bind(attempts)
        .bind(target_id)
        .execute(pool)
        .await
        .expect("Failed to set attempts");
}

/// Overrides settings used by pipeline tests: no inter-item delay.
pub async fn set_test_settings(pool: &SqlitePool, max_attempts: u32) {
    sqlx::query(
        "UPDATE geocoding_settings SET delay_seconds = 0, max_attempts = ?, enabled = 1 WHERE id = 1",
    )
    .bind(max_attempts)
    .execute(pool)
    .await
    .expect("Failed to update settings");
}
