//! Nominatim search client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use url::Url;

use super::GeocodeProvider;
use crate::config::{Config, QUERY_RESULT_LIMIT};
use crate::error_handling::{
    categorize_reqwest_error, categorize_status, parse_retry_after, InitializationError,
    ProviderError,
};
use crate::models::Coordinates;

/// Enforces a minimum spacing between consecutive provider requests.
///
/// Separate from the batch's inter-item delay: a single item may issue up to
/// two queries per variant, and those still have to respect the provider's
/// requests-per-second policy.
pub struct RequestPacer {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RequestPacer {
    /// Creates a pacer with the given minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    /// Waits until at least `min_interval` has passed since the previous call.
    pub async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

/// `GeocodeProvider` backed by a Nominatim `/search` endpoint.
pub struct NominatimClient {
    http: reqwest::Client,
    endpoint: Url,
    pacer: RequestPacer,
}

impl NominatimClient {
    /// Creates a client for the endpoint in `config`.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::ProviderUrlError` if the endpoint is not a valid URL.
    pub fn new(http: reqwest::Client, config: &Config) -> Result<Self, InitializationError> {
        let endpoint = Url::parse(&config.nominatim_url)?;
        Ok(Self {
            http,
            endpoint,
            pacer: RequestPacer::new(config.query_interval()),
        })
    }

    fn search_url(&self, query: &str, country_code: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("format", "jsonv2")
            .append_pair("limit", &QUERY_RESULT_LIMIT.to_string())
            .append_pair("countrycodes", country_code);
        url
    }
}

#[async_trait]
impl GeocodeProvider for NominatimClient {
    async fn lookup(
        &self,
        query: &str,
        country_code: &str,
    ) -> Result<Option<Coordinates>, ProviderError> {
        self.pacer.wait().await;

        let url = self.search_url(query, country_code);
        debug!("Nominatim query: {query} [{country_code}]");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            return Err(categorize_status(status.as_u16(), retry_after));
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        let Some(best) = results.into_iter().next() else {
            return Ok(None);
        };

        let latitude = best
            .lat
            .trim()
            .parse::<f64>()
            .map_err(|e| ProviderError::Malformed(format!("lat {:?}: {e}", best.lat)))?;
        let longitude = best
            .lon
            .trim()
            .parse::<f64>()
            .map_err(|e| ProviderError::Malformed(format!("lon {:?}: {e}", best.lon)))?;

        Ok(Some(Coordinates::new(latitude, longitude)))
    }
}
