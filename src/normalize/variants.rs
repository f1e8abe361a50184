//! Resolution variant derivation.

use serde::Serialize;

use super::NameNormalizer;
use crate::config::{MAX_VARIANTS, MIN_VARIANT_LENGTH};
use crate::models::GeocodeSource;

/// Which derivation produced a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// The city text as given
    Direct,
    /// Administrative prefix removed
    Cleaned,
    /// Misspelling table hit
    Corrected,
    /// Any other derived spelling
    Fuzzy,
}

impl Strategy {
    /// Source tag recorded when this strategy resolves a target.
    pub fn source(&self) -> GeocodeSource {
        match self {
            Strategy::Direct => GeocodeSource::Direct,
            Strategy::Cleaned => GeocodeSource::Cleaned,
            Strategy::Corrected => GeocodeSource::Corrected,
            Strategy::Fuzzy => GeocodeSource::Fuzzy,
        }
    }
}

/// One textual form of a city name to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    /// Query text
    pub text: String,
    /// Derivation that produced it
    pub strategy: Strategy,
}

impl NameNormalizer {
    /// Ordered resolution variants for `city`.
    ///
    /// Order is original, cleaned, corrected, then fuzzy forms (diacritic-free
    /// original, cleaned correction, diacritic-free cleaned, diacritic-free
    /// correction). Entries are distinct ignoring case, longer than one
    /// character, and capped at eight; a form equal to an earlier one keeps
    /// the earlier strategy.
    pub fn variants(&self, city: &str) -> Vec<Variant> {
        let original = city.trim().to_string();
        let cleaned = self.clean(&original);
        let corrected = self.correct(&original);

        let mut out: Vec<Variant> = Vec::with_capacity(MAX_VARIANTS);
        let mut push = |text: String, strategy: Strategy| {
            if out.len() >= MAX_VARIANTS || text.chars().count() <= MIN_VARIANT_LENGTH {
                return;
            }
            let lowered = text.to_lowercase();
            if out.iter().any(|v| v.text.to_lowercase() == lowered) {
                return;
            }
            out.push(Variant { text, strategy });
        };

        push(original.clone(), Strategy::Direct);
        push(cleaned.clone(), Strategy::Cleaned);
        if let Some(corrected) = &corrected {
            push(corrected.clone(), Strategy::Corrected);
        }

        push(self.strip_diacritics(&original), Strategy::Fuzzy);
        if let Some(corrected) = &corrected {
            push(self.clean(corrected), Strategy::Fuzzy);
        }
        push(self.strip_diacritics(&cleaned), Strategy::Fuzzy);
        if let Some(corrected) = &corrected {
            push(self.strip_diacritics(corrected), Strategy::Fuzzy);
        }

        out
    }
}
