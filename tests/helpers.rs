// Shared test helpers for service setup and scripted providers.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::Row;
use tempfile::TempDir;

use listing_geocoder::{Config, Coordinates, GeocodeProvider, GeocodingService, ProviderError};

type Responder = Box<dyn Fn(&str) -> Result<Option<Coordinates>, ProviderError> + Send + Sync>;

/// Provider that answers through a closure and counts calls.
pub struct TestProvider {
    respond: Responder,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

#[allow(dead_code)] // Used by other test files
impl TestProvider {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<Option<Coordinates>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Matches queries starting with `prefix` (case-insensitive).
    pub fn matching(prefix: &'static str, coords: Coordinates) -> Self {
        Self::new(move |q| {
            Ok(q.to_lowercase()
                .starts_with(&prefix.to_lowercase())
                .then_some(coords))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries lock").clone()
    }
}

#[async_trait]
impl GeocodeProvider for TestProvider {
    async fn lookup(
        &self,
        query: &str,
        _country_code: &str,
    ) -> Result<Option<Coordinates>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .expect("queries lock")
            .push(query.to_string());
        (self.respond)(query)
    }
}

/// Config pointing the database and the data tables into `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    Config {
        db_path: dir.path().join("listings.db"),
        data_dir: dir.path().join("data"),
        ..Default::default()
    }
}

/// Builds a service over a fresh temp directory with no inter-item delay.
///
/// The `TempDir` must be kept alive for the duration of the test.
#[allow(dead_code)] // Used by other test files
pub async fn create_test_service(provider: Arc<TestProvider>) -> (TempDir, GeocodingService) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = GeocodingService::with_provider(test_config(&dir), provider)
        .await
        .expect("Failed to create service");
    service
        .update_settings("delay_seconds", "0")
        .await
        .expect("Failed to clear delay");
    (dir, service)
}

/// Imports targets (one city per line) and returns their ids in input order.
#[allow(dead_code)] // Used by other test files
pub async fn import_cities(service: &GeocodingService, cities: &[&str]) -> Vec<i64> {
    let before: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM geocode_targets")
        .fetch_one(service.pool())
        .await
        .expect("Failed to read max id");
    let input = cities.join("\n");
    let report = service
        .import_targets(input.as_bytes())
        .await
        .expect("Failed to import targets");
    assert_eq!(report.imported, cities.len());

    sqlx::query("SELECT id FROM geocode_targets WHERE id > ? ORDER BY id")
        .bind(before)
        .fetch_all(service.pool())
        .await
        .expect("Failed to read target ids")
        .iter()
        .map(|row| row.get::<i64, _>("id"))
        .collect()
}

/// Reads `(geocoded, source, attempts, latitude, longitude)` for a target.
#[allow(dead_code)] // Used by other test files
pub async fn target_row(
    service: &GeocodingService,
    id: i64,
) -> (bool, Option<String>, i64, Option<f64>, Option<f64>) {
    let row = sqlx::query(
        "SELECT geocoded, geocode_source, attempts, latitude, longitude
         FROM geocode_targets WHERE id = ?",
    )
    .bind(id)
    .fetch_one(service.pool())
    .await
    .expect("Failed to load target");
    (
        row.get::<i64, _>("geocoded") != 0,
        row.get("geocode_source"),
        row.get("attempts"),
        row.get("latitude"),
        row.get("longitude"),
    )
}
