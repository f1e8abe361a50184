//! HTTP client initialization.

use reqwest::ClientBuilder;

use crate::config::Config;
use crate::error_handling::InitializationError;

/// Builds the HTTP client used for provider lookups.
///
/// The per-query timeout and the identifying User-Agent come from `config`.
/// Redirects are capped at a few hops since search endpoints do not chain.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the TLS backend cannot be
/// set up.
pub fn init_client(config: &Config) -> Result<reqwest::Client, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(config.query_timeout())
        .connect_timeout(config.query_timeout())
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(3))
        .build()?;
    Ok(client)
}
