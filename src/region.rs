//! Region boundaries drawn by the user, in world coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::raster::RasterGrid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for WorldPoint {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Closed simple polygon. The first point is repeated at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<WorldPoint>,
}

impl Polygon {
    /// Build a polygon, closing the ring when the caller left it open.
    pub fn new(points: impl IntoIterator<Item = WorldPoint>) -> ConvertResult<Self> {
        let mut points: Vec<WorldPoint> = points.into_iter().collect();
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(ConvertError::invalid_region(
                "polygon contains a non-finite coordinate",
            ));
        }

        let mut distinct: Vec<WorldPoint> = Vec::new();
        for point in &points {
            if !distinct.contains(point) {
                distinct.push(*point);
            }
        }
        if distinct.len() < 3 {
            return Err(ConvertError::invalid_region(format!(
                "polygon needs at least 3 distinct points, got {}",
                distinct.len()
            )));
        }

        if points.first() != points.last() {
            points.push(points[0]);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[WorldPoint] {
        &self.points
    }

    /// Even-odd containment test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        for edge in self.points.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            if (a.y > y) != (b.y > y) {
                let crossing = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
                if x < crossing {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.points.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), p| {
                (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y))
            },
        )
    }
}

/// Simulation region with an optional initial-distribution sub-region.
///
/// The sub-region is assumed to lie inside the outer region; the drawing
/// tool enforces that before the mask reaches this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    outer: Polygon,
    sub_region: Option<Polygon>,
}

impl RegionMask {
    pub fn new(outer: Polygon) -> Self {
        Self {
            outer,
            sub_region: None,
        }
    }

    pub fn with_sub_region(mut self, sub_region: Polygon) -> Self {
        self.sub_region = Some(sub_region);
        self
    }

    pub fn outer(&self) -> &Polygon {
        &self.outer
    }

    pub fn sub_region(&self) -> Option<&Polygon> {
        self.sub_region.as_ref()
    }
}

/// Presence raster on `grid`'s pixels: `1` where the pixel centre falls
/// inside `polygon`, `0` elsewhere.
pub fn rasterize_overlay(grid: &RasterGrid, polygon: &Polygon) -> RasterGrid {
    let mut values = Vec::with_capacity(grid.width() * grid.height());
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            let (x, y) = grid
                .transform()
                .apply(col as f64 + 0.5, row as f64 + 0.5);
            values.push(if polygon.contains(x, y) { 1.0 } else { 0.0 });
        }
    }
    grid.with_values(values)
}
