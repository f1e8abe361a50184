//! City name normalization.
//!
//! Turns raw, frequently misspelled city text into:
//! - a deterministic cache key, and
//! - an ordered list of resolution variants to try against the provider.
//!
//! Everything here is a pure function over the loaded `NormalizerTables`.

mod variants;

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{NormalizerTables, CACHE_KEY_SEPARATOR};

pub use variants::{Strategy, Variant};

// Anything but ASCII letters, digits, whitespace, hyphen and the key separator.
static NON_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-z0-9\s\-_]").expect("literal pattern compiles")
});

/// Normalizer over one set of correction, diacritic and prefix tables.
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    tables: NormalizerTables,
}

impl NameNormalizer {
    /// Creates a normalizer over the given tables.
    pub fn new(tables: NormalizerTables) -> Self {
        Self { tables }
    }

    /// Canonical cache key for `city`.
    ///
    /// Lower-cases, strips one leading administrative prefix, maps diacritics
    /// through the table, drops punctuation other than hyphens, collapses
    /// whitespace and joins the remaining tokens with `_`. Applying it to its
    /// own output returns the same key.
    pub fn cache_key(&self, city: &str) -> String {
        let lowered = city.trim().to_lowercase();
        let unprefixed = self.strip_prefix(&lowered).unwrap_or(&lowered);
        let ascii = self.strip_diacritics(unprefixed).to_lowercase();
        let stripped = NON_KEY_CHARS.replace_all(&ascii, "");
        let separator = CACHE_KEY_SEPARATOR.to_string();
        stripped
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(&separator)
    }

    /// Removes one leading administrative prefix, keeping the remainder's casing.
    ///
    /// A prefix only matches when followed by whitespace, so "Gmina Warszawa"
    /// is cleaned but "Gminawa" is not.
    pub fn clean(&self, city: &str) -> String {
        let trimmed = city.trim();
        self.strip_prefix(trimmed).unwrap_or(trimmed).to_string()
    }

    /// Replaces every mapped diacritic with its base-Latin text.
    pub fn strip_diacritics(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match self.tables.diacritics.get(&c) {
                Some(replacement) => out.push_str(replacement),
                None => out.push(c),
            }
        }
        out
    }

    /// Looks up a known misspelling.
    ///
    /// Tries the lower-cased text first, then its diacritic-free form, then
    /// the same two forms of the prefix-cleaned text.
    pub fn correct(&self, city: &str) -> Option<String> {
        let lowered = city.trim().to_lowercase();
        let cleaned = self.clean(&lowered);
        [
            lowered.clone(),
            self.strip_diacritics(&lowered),
            cleaned.clone(),
            self.strip_diacritics(&cleaned),
        ]
        .iter()
        .find_map(|candidate| self.tables.corrections.get(candidate).cloned())
    }

    fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.tables
            .prefixes
            .iter()
            .find_map(|prefix| strip_prefix_ci(text, prefix))
    }
}

/// Case-insensitive prefix strip that requires whitespace after the prefix.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.chars();
    for expected in prefix.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let rest = chars.as_str();
    if rest.starts_with(char::is_whitespace) {
        let rest = rest.trim();
        (!rest.is_empty()).then_some(rest)
    } else {
        None
    }
}
