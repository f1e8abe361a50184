//! Bounding-rectangle region check.
//!
//! A conservative filter: anything inside the rectangle is accepted even if it
//! falls outside the true national border, anything outside is rejected.

use serde::{Deserialize, Serialize};

use crate::models::Coordinates;

/// Inclusive latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    /// Southern edge
    pub min_lat: f64,
    /// Northern edge
    pub max_lat: f64,
    /// Western edge
    pub min_lng: f64,
    /// Eastern edge
    pub max_lng: f64,
}

impl RegionBounds {
    /// Rectangle enclosing Poland.
    pub fn poland() -> Self {
        Self {
            min_lat: 49.0,
            max_lat: 54.9,
            min_lng: 14.1,
            max_lng: 24.2,
        }
    }

    /// Returns true if both coordinates fall inside the rectangle.
    ///
    /// NaN never compares inside, so it is always rejected.
    pub fn contains(&self, coords: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&coords.latitude)
            && (self.min_lng..=self.max_lng).contains(&coords.longitude)
    }

    /// Finite edges with min <= max on both axes.
    pub fn is_well_formed(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lng, self.max_lng]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }
}

impl Default for RegionBounds {
    fn default() -> Self {
        Self::poland()
    }
}
