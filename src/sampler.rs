//! Grid sampler - fixed-stride walk over the aligned elevation grid

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::fuel::FuelModelTable;
use crate::neighborhood::AdjacencyEdge;
use crate::raster::AlignedLayers;

/// Spacing between retained pixels, in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Stride(u32);

impl Stride {
    pub fn new(value: u32) -> ConvertResult<Self> {
        if value == 0 {
            return Err(ConvertError::InvalidStride(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Sample positions along an axis of `len` pixels.
    pub fn steps(self, len: usize) -> usize {
        len.div_ceil(self.as_usize())
    }
}

impl TryFrom<u32> for Stride {
    type Error = ConvertError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Stride> for u32 {
    fn from(value: Stride) -> Self {
        value.0
    }
}

impl fmt::Display for Stride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Species discriminator understood by the downstream plant model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum TreeSpecies {
    #[default]
    None = 0,
    Locust = 1,
    Pine = 2,
    Oak = 3,
    Water = 4,
}

impl TryFrom<u32> for TreeSpecies {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Locust),
            2 => Ok(Self::Pine),
            3 => Ok(Self::Oak),
            4 => Ok(Self::Water),
            other => Err(format!("unknown tree species {other}")),
        }
    }
}

impl From<TreeSpecies> for u32 {
    fn from(value: TreeSpecies) -> Self {
        value as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SoilType {
    #[default]
    Dry = 0,
    Clay = 1,
    Water = 2,
}

impl TryFrom<u32> for SoilType {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Dry),
            1 => Ok(Self::Clay),
            2 => Ok(Self::Water),
            other => Err(format!("unknown soil type {other}")),
        }
    }
}

impl From<SoilType> for u32 {
    fn from(value: SoilType) -> Self {
        value as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub water: u32,
    pub sunlight: u32,
    pub nitrogen: u32,
    pub potassium: u32,
}

/// Per-cell state block. Field order is the serialized key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellState {
    pub current_resources: Resources,
    pub soil_type: SoilType,
    pub elevation: u32,
    pub tree_height: u32,
    pub tree_type: TreeSpecies,
}

/// `"{x}_{y}"` from truncated integer world coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn from_world(x: f64, y: f64) -> Self {
        Self(format!("{}_{}", x.trunc() as i64, y.trunc() as i64))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the integer world coordinates encoded in the id.
    pub fn world_coords(&self) -> Option<(i64, i64)> {
        let (x, y) = self.0.rsplit_once('_')?;
        Some((x.parse().ok()?, y.parse().ok()?))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One grid-graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleCell {
    pub id: CellId,
    pub col: usize,
    pub row: usize,
    pub state: CellState,
    pub neighborhood: Vec<AdjacencyEdge>,
}

impl SampleCell {
    pub fn overlay_present(&self) -> bool {
        self.state.tree_type != TreeSpecies::None
    }
}

/// Validity gate shared by the sampler and the neighbourhood builder: the
/// landcover code must map to a fuel model and the elevation must be a
/// non-negative number. Out-of-bounds coordinates are never habitable.
pub fn is_habitable(layers: &AlignedLayers, fuels: &FuelModelTable, col: i64, row: i64) -> bool {
    let (Some(elevation), Some(landcover)) = (
        layers.elevation().get(col, row),
        layers.landcover().get(col, row),
    ) else {
        return false;
    };
    fuels.contains(landcover) && elevation >= 0.0
}

pub struct GridSampler<'a> {
    layers: &'a AlignedLayers,
    fuels: &'a FuelModelTable,
    stride: Stride,
    overlay_species: TreeSpecies,
}

impl<'a> GridSampler<'a> {
    pub fn new(layers: &'a AlignedLayers, fuels: &'a FuelModelTable, stride: Stride) -> Self {
        Self {
            layers,
            fuels,
            stride,
            overlay_species: TreeSpecies::Locust,
        }
    }

    /// Species written into cells covered by the overlay.
    pub fn with_overlay_species(mut self, species: TreeSpecies) -> Self {
        self.overlay_species = species;
        self
    }

    /// Number of pixels the walk visits, valid or not.
    pub fn visited(&self) -> usize {
        self.stride.steps(self.layers.height()) * self.stride.steps(self.layers.width())
    }

    /// Valid samples in row-major order.
    pub fn sample(&self) -> Vec<SampleCell> {
        self.rows()
            .flat_map(|row| self.sample_row(row))
            .collect()
    }

    /// Same result as [`GridSampler::sample`], with rows spread over the
    /// rayon pool and concatenated back in row order.
    pub fn sample_parallel(&self) -> Vec<SampleCell> {
        let rows: Vec<usize> = self.rows().collect();
        rows.par_iter()
            .map(|&row| self.sample_row(row))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn rows(&self) -> impl Iterator<Item = usize> {
        (0..self.layers.height()).step_by(self.stride.as_usize())
    }

    fn sample_row(&self, row: usize) -> Vec<SampleCell> {
        (0..self.layers.width())
            .step_by(self.stride.as_usize())
            .filter_map(|col| self.sample_pixel(col, row))
            .collect()
    }

    fn sample_pixel(&self, col: usize, row: usize) -> Option<SampleCell> {
        if !is_habitable(self.layers, self.fuels, col as i64, row as i64) {
            tracing::trace!(target: "terrain_graph::sampler", col, row, "sample.skipped");
            return None;
        }

        let elevation = self.layers.elevation().value(col, row);
        let overlay_present = self
            .layers
            .overlay()
            .map(|overlay| {
                let value = overlay.value(col, row);
                value != 0.0 && !value.is_nan()
            })
            .unwrap_or(false);
        let (x, y) = self.layers.elevation().pixel_to_world(col, row);

        Some(SampleCell {
            id: CellId::from_world(x, y),
            col,
            row,
            state: CellState {
                elevation: elevation.trunc() as u32,
                tree_type: if overlay_present {
                    self.overlay_species
                } else {
                    TreeSpecies::None
                },
                ..CellState::default()
            },
            neighborhood: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{AffineTransform, RasterGrid, SpatialRef};

    fn layers(elevation: Vec<f64>, landcover: Vec<f64>, width: usize) -> AlignedLayers {
        let height = elevation.len() / width;
        let transform = AffineTransform::from_origin(1000.0, 2000.0, 10.0, 10.0);
        let elevation =
            RasterGrid::new(width, height, elevation, transform, SpatialRef::unknown()).unwrap();
        let landcover =
            RasterGrid::new(width, height, landcover, transform, SpatialRef::unknown()).unwrap();
        AlignedLayers::new(elevation, &landcover, None).unwrap()
    }

    #[test]
    fn stride_rejects_zero() {
        assert!(matches!(Stride::new(0), Err(ConvertError::InvalidStride(0))));
        assert_eq!(Stride::new(3).unwrap().steps(7), 3);
    }

    #[test]
    fn cell_id_truncates_toward_zero() {
        assert_eq!(CellId::from_world(12.9, -3.7).as_str(), "12_-3");
        assert_eq!(CellId::from_world(-0.5, 0.5).as_str(), "0_0");
        assert_eq!(CellId::from_world(500_210.0, 4_199_910.0).world_coords(), Some((500_210, 4_199_910)));
    }

    #[test]
    fn stride_two_visits_even_pixels_in_row_major_order() {
        let layers = layers(vec![5.0; 25], vec![10.0; 25], 5);
        let fuels = FuelModelTable::default();
        let sampler = GridSampler::new(&layers, &fuels, Stride::new(2).unwrap());

        let cells = sampler.sample();
        let pixels: Vec<(usize, usize)> = cells.iter().map(|c| (c.col, c.row)).collect();
        assert_eq!(
            pixels,
            vec![(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2), (0, 4), (2, 4), (4, 4)]
        );
        assert_eq!(sampler.visited(), 9);
        assert_eq!(cells[1].id.as_str(), "1020_2000");
        assert_eq!(cells[3].id.as_str(), "1000_1980");
    }

    #[test]
    fn invalid_samples_are_dropped() {
        let elevation = vec![3.0, -1.0, 3.0, f64::NAN];
        let landcover = vec![99_999.0, 10.0, 18.0, 10.0];
        let layers = layers(elevation, landcover, 2);
        let fuels = FuelModelTable::default();

        let cells = GridSampler::new(&layers, &fuels, Stride::new(1).unwrap()).sample();
        assert_eq!(cells.len(), 1);
        assert_eq!((cells[0].col, cells[0].row), (0, 1));
        assert_eq!(cells[0].state.elevation, 3);
    }

    #[test]
    fn overlay_sets_configured_species() {
        let transform = AffineTransform::identity();
        let elevation = RasterGrid::filled(2, 1, 1.0, transform, SpatialRef::unknown());
        let landcover = RasterGrid::filled(2, 1, 10.0, transform, SpatialRef::unknown());
        let overlay =
            RasterGrid::new(2, 1, vec![0.0, 255.0], transform, SpatialRef::unknown()).unwrap();
        let layers = AlignedLayers::new(elevation, &landcover, Some(&overlay)).unwrap();
        let fuels = FuelModelTable::default();

        let cells = GridSampler::new(&layers, &fuels, Stride::new(1).unwrap())
            .with_overlay_species(TreeSpecies::Pine)
            .sample();
        assert_eq!(cells[0].state.tree_type, TreeSpecies::None);
        assert_eq!(cells[1].state.tree_type, TreeSpecies::Pine);
        assert!(cells[1].overlay_present());
    }

    #[test]
    fn parallel_matches_serial() {
        let elevation: Vec<f64> = (0..64).map(|i| if i % 7 == 0 { -5.0 } else { i as f64 }).collect();
        let landcover: Vec<f64> = (0..64).map(|i| if i % 5 == 0 { 3.0 } else { 1.0 }).collect();
        let layers = layers(elevation, landcover, 8);
        let fuels = FuelModelTable::default();
        let sampler = GridSampler::new(&layers, &fuels, Stride::new(1).unwrap());

        assert_eq!(sampler.sample(), sampler.sample_parallel());
    }

    #[test]
    fn state_serializes_species_as_integers() {
        let state = CellState {
            elevation: 12,
            tree_type: TreeSpecies::Locust,
            ..CellState::default()
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["tree_type"], 1);
        assert_eq!(json["soil_type"], 0);
        assert_eq!(json["current_resources"]["potassium"], 0);
    }
}
