use crate::error::{ConvertError, ConvertResult};

use super::RasterGrid;

/// Written into destination pixels the secondary raster does not cover.
/// Zero is absent from the landcover table and reads as "no overlay".
pub const ALIGN_FILL_VALUE: f64 = 0.0;

/// Resample `secondary` onto the pixel grid of `primary` by nearest-neighbour
/// value copy.
///
/// Every destination pixel centre is taken to world space through the
/// primary transform and back into the secondary raster through its inverse
/// transform. Values are never blended, so classification codes and
/// presence flags survive unchanged.
pub fn align(primary: &RasterGrid, secondary: &RasterGrid) -> ConvertResult<RasterGrid> {
    if primary.is_empty() {
        return Err(ConvertError::alignment(format!(
            "primary raster has zero extent ({}x{})",
            primary.width(),
            primary.height()
        )));
    }
    if secondary.is_empty() {
        return Err(ConvertError::alignment(format!(
            "secondary raster has zero extent ({}x{})",
            secondary.width(),
            secondary.height()
        )));
    }
    if primary.spatial_ref().conflicts_with(secondary.spatial_ref()) {
        return Err(ConvertError::alignment(format!(
            "spatial reference mismatch: primary {} vs secondary {}",
            primary.spatial_ref(),
            secondary.spatial_ref()
        )));
    }

    if primary.same_grid(secondary) {
        return Ok(primary.with_values(secondary.values().to_vec()));
    }

    let inverse = secondary.transform().inverse().ok_or_else(|| {
        ConvertError::alignment("secondary raster transform is not invertible")
    })?;

    let width = primary.width();
    let height = primary.height();
    let mut values = Vec::with_capacity(width * height);
    let mut uncovered = 0usize;
    for row in 0..height {
        for col in 0..width {
            let (x, y) = primary
                .transform()
                .apply(col as f64 + 0.5, row as f64 + 0.5);
            let (src_col, src_row) = inverse.apply(x, y);
            let value = if src_col.is_finite() && src_row.is_finite() {
                secondary.get(src_col.floor() as i64, src_row.floor() as i64)
            } else {
                None
            };
            values.push(value.unwrap_or_else(|| {
                uncovered += 1;
                ALIGN_FILL_VALUE
            }));
        }
    }

    tracing::debug!(
        target: "terrain_graph::align",
        width,
        height,
        source_width = secondary.width(),
        source_height = secondary.height(),
        uncovered,
        "align.resampled"
    );

    Ok(primary.with_values(values))
}

/// Elevation, landcover and optional overlay rasters sharing one pixel grid.
#[derive(Debug, Clone)]
pub struct AlignedLayers {
    elevation: RasterGrid,
    landcover: RasterGrid,
    overlay: Option<RasterGrid>,
}

impl AlignedLayers {
    /// Align `landcover` and `overlay` onto the elevation grid.
    pub fn new(
        elevation: RasterGrid,
        landcover: &RasterGrid,
        overlay: Option<&RasterGrid>,
    ) -> ConvertResult<Self> {
        let landcover = align(&elevation, landcover)?;
        let overlay = overlay.map(|raster| align(&elevation, raster)).transpose()?;
        Ok(Self {
            elevation,
            landcover,
            overlay,
        })
    }

    pub fn elevation(&self) -> &RasterGrid {
        &self.elevation
    }

    pub fn landcover(&self) -> &RasterGrid {
        &self.landcover
    }

    pub fn overlay(&self) -> Option<&RasterGrid> {
        self.overlay.as_ref()
    }

    pub fn width(&self) -> usize {
        self.elevation.width()
    }

    pub fn height(&self) -> usize {
        self.elevation.height()
    }

    /// Replace the overlay with one already on the elevation grid.
    pub fn with_overlay(mut self, overlay: RasterGrid) -> ConvertResult<Self> {
        if !self.elevation.same_grid(&overlay) {
            return Err(ConvertError::alignment(
                "overlay raster does not share the elevation grid",
            ));
        }
        self.overlay = Some(overlay);
        Ok(self)
    }
}
