//! File-backed normalization and region tables.
//!
//! The tables live as JSON files in a data directory so operators can edit them
//! without a rebuild:
//!
//! - `city_corrections.json`: known misspelling → canonical name
//! - `diacritic_mapping.json`: accented character → base-Latin replacement
//! - `common_prefixes.json`: administrative prefixes stripped before lookup
//! - `region.json`: country restriction and bounding rectangle
//!
//! Missing files are written with the built-in Polish defaults on first start.
//! A file that exists but cannot be parsed is an initialization error rather
//! than a silent fallback, so a typo in an edited table is noticed.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error_handling::InitializationError;
use crate::region::RegionBounds;

const CORRECTIONS_FILE: &str = "city_corrections.json";
const DIACRITICS_FILE: &str = "diacritic_mapping.json";
const PREFIXES_FILE: &str = "common_prefixes.json";
const REGION_FILE: &str = "region.json";

/// Country restriction and bounding rectangle for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    /// ISO 3166-1 alpha-2 code passed to the provider (`countrycodes`)
    pub country_code: String,
    /// Country name appended to the loosely-qualified query form
    pub country_name: String,
    /// Accepted coordinate rectangle
    pub bounds: RegionBounds,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            country_code: "pl".to_string(),
            country_name: "Poland".to_string(),
            bounds: RegionBounds::poland(),
        }
    }
}

/// Lookup tables consumed by the name normalizer.
#[derive(Debug, Clone, Default)]
pub struct NormalizerTables {
    /// Lower-cased misspelling → canonical name
    pub corrections: HashMap<String, String>,
    /// Accented character → replacement text
    pub diacritics: HashMap<char, String>,
    /// Lower-cased administrative prefixes, matched in order
    pub prefixes: Vec<String>,
}

impl NormalizerTables {
    /// Built-in Polish tables.
    pub fn polish() -> Self {
        let corrections = default_corrections()
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        let diacritics = default_diacritics()
            .into_iter()
            .filter_map(|(k, v)| single_char(&k).map(|c| (c, v)))
            .collect();
        Self {
            corrections,
            diacritics,
            prefixes: default_prefixes(),
        }
    }
}

/// Everything loaded from the data directory.
#[derive(Debug, Clone)]
pub struct GeocodingData {
    /// Normalizer tables
    pub tables: NormalizerTables,
    /// Region restriction
    pub region: RegionConfig,
}

impl Default for GeocodingData {
    fn default() -> Self {
        Self {
            tables: NormalizerTables::polish(),
            region: RegionConfig::default(),
        }
    }
}

impl GeocodingData {
    /// Loads the tables from `dir`, writing defaults for any missing file.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::DataFileError` if the directory cannot be
    /// created, a default cannot be written, or an existing file is malformed.
    pub fn load_or_init(dir: &Path) -> Result<Self, InitializationError> {
        fs::create_dir_all(dir).map_err(|e| {
            InitializationError::DataFileError(format!(
                "cannot create data directory {}: {e}",
                dir.display()
            ))
        })?;

        let corrections: BTreeMap<String, String> =
            load_or_write(dir, CORRECTIONS_FILE, default_corrections)?;
        let diacritics: BTreeMap<String, String> =
            load_or_write(dir, DIACRITICS_FILE, default_diacritics)?;
        let prefixes: Vec<String> = load_or_write(dir, PREFIXES_FILE, default_prefixes)?;
        let region: RegionConfig = load_or_write(dir, REGION_FILE, RegionConfig::default)?;

        let mut diacritic_map = HashMap::with_capacity(diacritics.len());
        for (key, replacement) in diacritics {
            let c = single_char(&key).ok_or_else(|| {
                InitializationError::DataFileError(format!(
                    "{DIACRITICS_FILE}: key {key:?} must be exactly one character"
                ))
            })?;
            diacritic_map.insert(c, replacement);
        }

        if !region.bounds.is_well_formed() {
            return Err(InitializationError::DataFileError(format!(
                "{REGION_FILE}: bounds are inverted or not finite: {:?}",
                region.bounds
            )));
        }

        let tables = NormalizerTables {
            corrections: corrections
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v))
                .collect(),
            diacritics: diacritic_map,
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        };

        info!(
            "Loaded geocoding data from {} ({} corrections, {} diacritics, {} prefixes, region {})",
            dir.display(),
            tables.corrections.len(),
            tables.diacritics.len(),
            tables.prefixes.len(),
            region.country_code
        );

        Ok(Self { tables, region })
    }
}

fn load_or_write<T, F>(dir: &Path, name: &str, default: F) -> Result<T, InitializationError>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    let path = dir.join(name);
    if !path.exists() {
        let value = default();
        let json = serde_json::to_string_pretty(&value).map_err(|e| {
            InitializationError::DataFileError(format!("cannot serialize {name}: {e}"))
        })?;
        fs::write(&path, json).map_err(|e| {
            InitializationError::DataFileError(format!("cannot write {}: {e}", path.display()))
        })?;
        debug!("Wrote default {}", path.display());
        return Ok(value);
    }

    let raw = fs::read_to_string(&path).map_err(|e| {
        InitializationError::DataFileError(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        InitializationError::DataFileError(format!("malformed {}: {e}", path.display()))
    })
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn default_corrections() -> BTreeMap<String, String> {
    [
        ("warszewa", "warszawa"),
        ("warsawa", "warszawa"),
        ("warshawa", "warszawa"),
        ("krakuw", "krakow"),
        ("krakof", "krakow"),
        ("wroclw", "wroclaw"),
        ("wrocalw", "wroclaw"),
        ("wrocaw", "wroclaw"),
        ("gdanks", "gdansk"),
        ("poznań", "poznan"),
        ("łódz", "lodz"),
        ("szczesz", "szczecin"),
        ("bydgoscz", "bydgoszcz"),
        ("lubllin", "lublin"),
        ("katovice", "katowice"),
        ("rzeszów", "rzeszow"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_diacritics() -> BTreeMap<String, String> {
    [
        ("ą", "a"),
        ("ć", "c"),
        ("ę", "e"),
        ("ł", "l"),
        ("ń", "n"),
        ("ó", "o"),
        ("ś", "s"),
        ("ź", "z"),
        ("ż", "z"),
        ("Ą", "A"),
        ("Ć", "C"),
        ("Ę", "E"),
        ("Ł", "L"),
        ("Ń", "N"),
        ("Ó", "O"),
        ("Ś", "S"),
        ("Ź", "Z"),
        ("Ż", "Z"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_prefixes() -> Vec<String> {
    [
        "gmina",
        "gm.",
        "miasto",
        "m.",
        "powiat",
        "pow.",
        "województwo",
        "woj.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
