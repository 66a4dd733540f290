pub mod config;
pub mod error;
pub mod fuel;
pub mod neighborhood;
pub mod pipeline;
pub mod raster;
pub mod region;
pub mod sampler;
pub mod scenario;

pub use config::{ConfigLoader, ConversionConfig};
pub use error::{ConvertError, ConvertResult};
pub use fuel::FuelModelTable;
pub use pipeline::{Conversion, ConversionInputs, ConversionSettings, Converter, ConverterBuilder};
pub use raster::{AffineTransform, AlignedLayers, RasterGrid, SpatialRef};
pub use sampler::{CellId, SampleCell, Stride};
pub use scenario::{CellTemplate, Scenario};
