//! Resolution strategy chain.
//!
//! Walks the normalizer's variants in order and asks the provider for each one,
//! first loosely qualified with the country name and then strictly qualified
//! with the country code. The first candidate inside the region wins.
//!
//! Provider failures on a single query are recorded and treated as a non-match
//! for that query. A quota signal ends the chain at once so the orchestrator
//! can back off.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::RegionConfig;
use crate::error_handling::{ProviderError, ResolveError};
use crate::models::Coordinates;
use crate::normalize::{NameNormalizer, Strategy, Variant};
use crate::provider::GeocodeProvider;

/// A successful in-region match.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Accepted coordinate
    pub coordinates: Coordinates,
    /// Strategy of the variant that matched
    pub strategy: Strategy,
    /// Variant text that matched
    pub variant: String,
    /// Full query string that produced the candidate
    pub query: String,
}

/// What happened while walking the chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// Variants tried
    pub variants: usize,
    /// Provider queries issued
    pub queries: usize,
    /// Candidates rejected for lying outside the region
    pub rejected_out_of_region: usize,
    /// Non-quota provider failures, in order
    pub provider_errors: Vec<ProviderError>,
}

impl ResolutionReport {
    /// One-line description of why nothing matched.
    pub fn failure_summary(&self) -> String {
        let mut summary = format!(
            "no in-region match across {} variant{} ({} quer{})",
            self.variants,
            if self.variants == 1 { "" } else { "s" },
            self.queries,
            if self.queries == 1 { "y" } else { "ies" },
        );
        if self.rejected_out_of_region > 0 {
            summary.push_str(&format!(
                ", {} out-of-region candidate{} rejected",
                self.rejected_out_of_region,
                if self.rejected_out_of_region == 1 { "" } else { "s" }
            ));
        }
        if let Some(last) = self.provider_errors.last() {
            summary.push_str(&format!(
                ", {} provider error{} (last: {last})",
                self.provider_errors.len(),
                if self.provider_errors.len() == 1 { "" } else { "s" }
            ));
        }
        summary
    }
}

/// Result of one chain walk that was not throttled.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOutcome {
    /// The match, if any variant produced one
    pub resolution: Option<Resolution>,
    /// Bookkeeping for logging and error reporting
    pub report: ResolutionReport,
}

/// Resolves city names against a provider within one region.
#[derive(Clone)]
pub struct Resolver {
    provider: Arc<dyn GeocodeProvider>,
    normalizer: Arc<NameNormalizer>,
    region: RegionConfig,
}

impl Resolver {
    /// Creates a resolver.
    pub fn new(
        provider: Arc<dyn GeocodeProvider>,
        normalizer: Arc<NameNormalizer>,
        region: RegionConfig,
    ) -> Self {
        Self {
            provider,
            normalizer,
            region,
        }
    }

    /// Normalizer used to derive variants.
    pub fn normalizer(&self) -> &Arc<NameNormalizer> {
        &self.normalizer
    }

    /// Region every accepted candidate must fall inside.
    pub fn region(&self) -> &RegionConfig {
        &self.region
    }

    /// Runs the chain for `city`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Throttled` as soon as the provider signals a quota limit.
    pub async fn resolve(&self, city: &str) -> Result<ResolveOutcome, ResolveError> {
        let variants = self.normalizer.variants(city);
        self.resolve_variants(city, &variants).await
    }

    /// Runs the chain over an explicit variant list.
    pub async fn resolve_variants(
        &self,
        city: &str,
        variants: &[Variant],
    ) -> Result<ResolveOutcome, ResolveError> {
        let mut report = ResolutionReport::default();

        for variant in variants {
            report.variants += 1;
            for query in self.queries_for(&variant.text) {
                report.queries += 1;
                match self
                    .provider
                    .lookup(&query, &self.region.country_code)
                    .await
                {
                    Ok(Some(coords)) if self.region.bounds.contains(coords) => {
                        info!(
                            "Resolved '{city}' via {:?} variant '{}' at {coords}",
                            variant.strategy, variant.text
                        );
                        return Ok(ResolveOutcome {
                            resolution: Some(Resolution {
                                coordinates: coords,
                                strategy: variant.strategy,
                                variant: variant.text.clone(),
                                query,
                            }),
                            report,
                        });
                    }
                    Ok(Some(coords)) => {
                        debug!("Rejected out-of-region candidate {coords} for '{query}'");
                        report.rejected_out_of_region += 1;
                    }
                    Ok(None) => debug!("No match for '{query}'"),
                    Err(ProviderError::Quota { retry_after }) => {
                        warn!("Provider quota signal while resolving '{city}', aborting chain");
                        return Err(ResolveError::Throttled { retry_after });
                    }
                    Err(e) => {
                        warn!("Lookup failed for '{query}': {e}");
                        report.provider_errors.push(e);
                    }
                }
            }
        }

        debug!("No in-region match for '{city}': {}", report.failure_summary());
        Ok(ResolveOutcome {
            resolution: None,
            report,
        })
    }

    fn queries_for(&self, text: &str) -> [String; 2] {
        [
            format!("{text}, {}", self.region.country_name),
            format!("{text}, {}", self.region.country_code.to_uppercase()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerTables;
    use crate::provider::mock::ScriptedProvider;
    use std::time::Duration;

    const WARSZAWA: Coordinates = Coordinates {
        latitude: 52.2297,
        longitude: 21.0122,
    };
    const BERLIN: Coordinates = Coordinates {
        latitude: 52.52,
        longitude: 13.405,
    };

    fn resolver(provider: Arc<ScriptedProvider>) -> Resolver {
        Resolver::new(
            provider,
            Arc::new(NameNormalizer::new(NormalizerTables::polish())),
            RegionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_direct_match_on_first_query() {
        let provider = Arc::new(ScriptedProvider::matching("warszawa", WARSZAWA));
        let outcome = resolver(provider.clone())
            .resolve("Warszawa")
            .await
            .expect("not throttled");

        let resolution = outcome.resolution.expect("resolved");
        assert_eq!(resolution.strategy, Strategy::Direct);
        assert_eq!(resolution.query, "Warszawa, Poland");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_query_tried_after_loose_query() {
        let provider = Arc::new(ScriptedProvider::new(|q| {
            Ok((q == "Sopot, PL").then_some(Coordinates::new(54.44, 18.56)))
        }));
        let outcome = resolver(provider.clone())
            .resolve("Sopot")
            .await
            .expect("not throttled");

        assert_eq!(provider.queries(), vec!["Sopot, Poland", "Sopot, PL"]);
        assert_eq!(
            outcome.resolution.map(|r| r.strategy),
            Some(Strategy::Direct)
        );
    }

    #[tokio::test]
    async fn test_corrected_variant_tagged() {
        let provider = Arc::new(ScriptedProvider::matching("warszawa", WARSZAWA));
        let outcome = resolver(provider.clone())
            .resolve("Warszewa")
            .await
            .expect("not throttled");

        let resolution = outcome.resolution.expect("resolved");
        assert_eq!(resolution.strategy, Strategy::Corrected);
        assert_eq!(resolution.variant, "warszawa");
        assert_eq!(
            provider.queries(),
            vec!["Warszewa, Poland", "Warszewa, PL", "warszawa, Poland"]
        );
    }

    #[tokio::test]
    async fn test_out_of_region_candidates_rejected() {
        let provider = Arc::new(ScriptedProvider::new(|_| Ok(Some(BERLIN))));
        let outcome = resolver(provider.clone())
            .resolve("Berlin")
            .await
            .expect("not throttled");

        assert!(outcome.resolution.is_none());
        assert_eq!(outcome.report.rejected_out_of_region, provider.calls());
    }

    #[tokio::test]
    async fn test_provider_errors_do_not_abort_chain() {
        let provider = Arc::new(ScriptedProvider::new(|q| {
            if q.ends_with("Poland") {
                Err(ProviderError::Timeout)
            } else {
                Ok((q == "Łódź, PL").then_some(Coordinates::new(51.759, 19.456)))
            }
        }));
        let outcome = resolver(provider.clone())
            .resolve("Łódź")
            .await
            .expect("not throttled");

        assert!(outcome.resolution.is_some());
        assert_eq!(outcome.report.provider_errors, vec![ProviderError::Timeout]);
    }

    #[tokio::test]
    async fn test_quota_aborts_chain_immediately() {
        let provider = Arc::new(ScriptedProvider::new(|_| {
            Err(ProviderError::Quota {
                retry_after: Some(Duration::from_secs(30)),
            })
        }));
        let result = resolver(provider.clone()).resolve("Gmina Łódź").await;

        assert_eq!(
            result,
            Err(ResolveError::Throttled {
                retry_after: Some(Duration::from_secs(30))
            })
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_failure() {
        let provider = Arc::new(ScriptedProvider::empty());
        let outcome = resolver(provider.clone())
            .resolve("Nowhereistan")
            .await
            .expect("not throttled");

        assert!(outcome.resolution.is_none());
        assert_eq!(outcome.report.variants, 1);
        assert_eq!(outcome.report.queries, 2);
        assert_eq!(
            outcome.report.failure_summary(),
            "no in-region match across 1 variant (2 queries)"
        );
    }

    #[test]
    fn test_failure_summary_mentions_errors() {
        let report = ResolutionReport {
            variants: 3,
            queries: 6,
            rejected_out_of_region: 1,
            provider_errors: vec![ProviderError::Status(502), ProviderError::Timeout],
        };
        assert_eq!(
            report.failure_summary(),
            "no in-region match across 3 variants (6 queries), 1 out-of-region candidate rejected, 2 provider errors (last: lookup timed out)"
        );
    }
}
