//! Raster model - single-band grids with an affine georeference

pub mod align;
pub mod geotiff;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};

pub use align::{align, AlignedLayers, ALIGN_FILL_VALUE};
pub use geotiff::load_geotiff;

/// Maps (column, row) pixel space onto world coordinates:
/// `x = a*col + b*row + c`, `y = d*col + e*row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// North-up transform anchored at the upper-left corner `(x, y)`.
    pub fn from_origin(x: f64, y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self::new(pixel_width, 0.0, x, 0.0, -pixel_height, y)
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// World → pixel mapping, or `None` when the transform is degenerate.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        Some(Self::new(
            ia,
            ib,
            -(ia * self.c + ib * self.f),
            id,
            ie,
            -(id * self.c + ie * self.f),
        ))
    }

    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        let lhs = [self.a, self.b, self.c, self.d, self.e, self.f];
        let rhs = [other.a, other.b, other.c, other.d, other.e, other.f];
        lhs.iter()
            .zip(rhs.iter())
            .all(|(l, r)| (l - r).abs() <= tolerance)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Spatial reference identifier such as `EPSG:32617`. Unknown when the
/// source carried no usable geokeys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SpatialRef(Option<String>);

impl SpatialRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn unknown() -> Self {
        Self(None)
    }

    pub fn epsg(code: u32) -> Self {
        Self::new(format!("EPSG:{code}"))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Two references conflict only when both are known and differ.
    pub fn conflicts_with(&self, other: &SpatialRef) -> bool {
        matches!((&self.0, &other.0), (Some(a), Some(b)) if a != b)
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(id) => write!(f, "{id}"),
            None => write!(f, "unknown"),
        }
    }
}

/// Immutable single-band raster stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGrid {
    width: usize,
    height: usize,
    values: Vec<f64>,
    transform: AffineTransform,
    spatial_ref: SpatialRef,
}

impl RasterGrid {
    pub fn new(
        width: usize,
        height: usize,
        values: Vec<f64>,
        transform: AffineTransform,
        spatial_ref: SpatialRef,
    ) -> ConvertResult<Self> {
        if values.len() != width * height {
            return Err(ConvertError::alignment(format!(
                "raster holds {} samples but declares {width}x{height}",
                values.len()
            )));
        }
        Ok(Self {
            width,
            height,
            values,
            transform,
            spatial_ref,
        })
    }

    /// Raster with every pixel set to `value`.
    pub fn filled(
        width: usize,
        height: usize,
        value: f64,
        transform: AffineTransform,
        spatial_ref: SpatialRef,
    ) -> Self {
        Self {
            width,
            height,
            values: vec![value; width * height],
            transform,
            spatial_ref,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn spatial_ref(&self) -> &SpatialRef {
        &self.spatial_ref
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at an in-bounds pixel.
    #[inline]
    pub fn value(&self, col: usize, row: usize) -> f64 {
        debug_assert!(col < self.width && row < self.height);
        self.values[row * self.width + col]
    }

    /// Bounds-checked lookup for signed pixel coordinates.
    pub fn get(&self, col: i64, row: i64) -> Option<f64> {
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.value(col, row))
    }

    /// World coordinates of the pixel's upper-left corner.
    pub fn pixel_to_world(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.apply(col as f64, row as f64)
    }

    pub fn same_grid(&self, other: &RasterGrid) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.transform.approx_eq(&other.transform, 1e-9)
    }

    pub(crate) fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.width * self.height);
        Self {
            width: self.width,
            height: self.height,
            values,
            transform: self.transform,
            spatial_ref: self.spatial_ref.clone(),
        }
    }
}
