//! Landcover classification → fuel model lookup.
//!
//! The table only gates habitability: a landcover code with an entry is a
//! usable cell, a code without one is dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type LandcoverCode = i64;
pub type FuelModelId = u32;

/// North American landcover classes mapped onto Scott & Burgan fuel models.
const NALCMS_FUEL_MODELS: [(LandcoverCode, FuelModelId); 15] = [
    (1, 10),   // temperate or sub-polar needleleaf forest
    (2, 13),   // sub-polar taiga
    (5, 9),    // temperate or sub-polar broadleaf deciduous forest
    (6, 8),    // mixed forest
    (8, 141),  // temperate or sub-polar shrubland
    (10, 101), // temperate or sub-polar grassland
    (11, 93),  // sub-polar or polar shrubland-lichen-moss
    (12, 103), // sub-polar or polar grassland-lichen-moss
    (13, 99),  // sub-polar or polar barren-lichen-moss
    (14, 94),  // wetland
    (15, 93),  // cropland
    (16, 99),  // barren lands
    (17, 91),  // urban
    (18, 98),  // water
    (19, 92),  // snow and ice
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FuelModelTable {
    entries: BTreeMap<LandcoverCode, FuelModelId>,
}

impl FuelModelTable {
    pub fn new(entries: impl IntoIterator<Item = (LandcoverCode, FuelModelId)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn nalcms() -> Self {
        Self::new(NALCMS_FUEL_MODELS)
    }

    /// Fuel model for a raw raster sample. The sample is truncated to an
    /// integer code; non-finite samples never match.
    pub fn lookup(&self, landcover: f64) -> Option<FuelModelId> {
        if !landcover.is_finite() {
            return None;
        }
        self.entries.get(&(landcover.trunc() as LandcoverCode)).copied()
    }

    pub fn contains(&self, landcover: f64) -> bool {
        self.lookup(landcover).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FuelModelTable {
    fn default() -> Self {
        Self::nalcms()
    }
}
