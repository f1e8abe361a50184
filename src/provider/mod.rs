//! External coordinate lookup.
//!
//! The pipeline only sees the `GeocodeProvider` trait: a free-text query plus a
//! country restriction in, zero or one best-match coordinate out. The shipped
//! implementation talks to a Nominatim search endpoint.

mod nominatim;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error_handling::ProviderError;
use crate::models::Coordinates;

pub use nominatim::{NominatimClient, RequestPacer};

/// A coordinate lookup service.
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Returns the best match for `query` restricted to `country_code`, if any.
    async fn lookup(
        &self,
        query: &str,
        country_code: &str,
    ) -> Result<Option<Coordinates>, ProviderError>;
}
