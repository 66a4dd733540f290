#![allow(dead_code)]

use std::collections::HashMap;

use terrain_graph::{
    AffineTransform, ConversionInputs, ConversionSettings, Converter, ConverterBuilder,
    RasterGrid, SampleCell, Scenario, SpatialRef, Stride,
};

pub const PIXEL: f64 = 10.0;
pub const ORIGIN_X: f64 = 500_000.0;
pub const ORIGIN_Y: f64 = 4_200_000.0;

pub fn transform() -> AffineTransform {
    AffineTransform::from_origin(ORIGIN_X, ORIGIN_Y, PIXEL, PIXEL)
}

pub fn raster(width: usize, height: usize, values: Vec<f64>) -> RasterGrid {
    RasterGrid::new(width, height, values, transform(), SpatialRef::epsg(32617))
        .expect("raster dimensions")
}

pub fn flat(width: usize, height: usize, value: f64) -> RasterGrid {
    raster(width, height, vec![value; width * height])
}

pub fn converter(stride: u32) -> Converter {
    let settings = ConversionSettings::new("fixture", Stride::new(stride).expect("stride"));
    ConverterBuilder::new(settings).build()
}

pub fn convert(inputs: ConversionInputs, stride: u32) -> Scenario {
    converter(stride)
        .convert(inputs)
        .map(|conversion| conversion.scenario)
        .expect("conversion succeeds")
}

pub fn cell_id(col: usize, row: usize) -> String {
    let x = ORIGIN_X + col as f64 * PIXEL;
    let y = ORIGIN_Y - row as f64 * PIXEL;
    format!("{}_{}", x as i64, y as i64)
}

pub fn by_pixel(scenario: &Scenario) -> HashMap<(usize, usize), &SampleCell> {
    scenario
        .cells()
        .iter()
        .map(|cell| ((cell.col, cell.row), cell))
        .collect()
}
