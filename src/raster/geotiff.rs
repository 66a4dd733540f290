//! GeoTIFF loading via the `tiff` decoder.
//!
//! Only the first band is kept. The georeference comes from the
//! `ModelTransformationTag` when present, otherwise from the tiepoint and
//! pixel-scale pair (pixel-is-area). Rasters without geotags get an
//! identity transform so they still load for pixel-space work.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::TiffError;

use crate::error::{ConvertError, ConvertResult};

use super::{AffineTransform, RasterGrid, SpatialRef};

const GEOGRAPHIC_TYPE_GEO_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u32 = 3072;
const USER_DEFINED_GEO_KEY_VALUE: u32 = 32767;

pub fn load_geotiff(path: impl AsRef<Path>) -> ConvertResult<RasterGrid> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConvertError::RasterOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let read_err = |source: TiffError| ConvertError::RasterRead {
        path: path.to_path_buf(),
        source,
    };

    let mut decoder = Decoder::new(BufReader::new(file)).map_err(read_err)?;
    let (width, height) = decoder.dimensions().map_err(read_err)?;
    let (width, height) = (width as usize, height as usize);

    let transformation = find_f64_tag(&mut decoder, Tag::ModelTransformationTag).map_err(read_err)?;
    let tiepoints = find_f64_tag(&mut decoder, Tag::ModelTiepointTag).map_err(read_err)?;
    let pixel_scale = find_f64_tag(&mut decoder, Tag::ModelPixelScaleTag).map_err(read_err)?;
    let geokeys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .and_then(|value| value.map(|v| v.into_u32_vec()).transpose())
        .map_err(read_err)?;

    let samples = decoding_result_to_f64(decoder.read_image().map_err(read_err)?)
        .ok_or_else(|| unsupported(path, "sample format"))?;
    let values = first_band(samples, width * height).ok_or_else(|| {
        unsupported(path, "band layout (sample count does not divide the pixel count)")
    })?;

    let transform = transform_from_tags(
        transformation.as_deref(),
        tiepoints.as_deref(),
        pixel_scale.as_deref(),
    );
    let spatial_ref = geokeys
        .as_deref()
        .map(spatial_ref_from_geokeys)
        .unwrap_or_default();

    tracing::debug!(
        target: "terrain_graph::geotiff",
        path = %path.display(),
        width,
        height,
        spatial_ref = %spatial_ref,
        "geotiff.loaded"
    );

    RasterGrid::new(width, height, values, transform, spatial_ref)
}

fn unsupported(path: &Path, what: &str) -> ConvertError {
    ConvertError::alignment(format!("{}: unsupported GeoTIFF {what}", path.display()))
}

fn find_f64_tag<R>(decoder: &mut Decoder<R>, tag: Tag) -> Result<Option<Vec<f64>>, TiffError>
where
    R: std::io::Read + std::io::Seek,
{
    decoder
        .find_tag(tag)?
        .map(|value| value.into_f64_vec())
        .transpose()
}

fn decoding_result_to_f64(result: DecodingResult) -> Option<Vec<f64>> {
    let values = match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(values)
}

/// Keep band 1 of chunky (pixel-interleaved) samples.
fn first_band(samples: Vec<f64>, pixels: usize) -> Option<Vec<f64>> {
    if pixels == 0 {
        return samples.is_empty().then_some(samples);
    }
    if samples.len() % pixels != 0 {
        return None;
    }
    let per_pixel = samples.len() / pixels;
    if per_pixel == 1 {
        return Some(samples);
    }
    Some(samples.into_iter().step_by(per_pixel).collect())
}

pub(crate) fn transform_from_tags(
    transformation: Option<&[f64]>,
    tiepoints: Option<&[f64]>,
    pixel_scale: Option<&[f64]>,
) -> AffineTransform {
    if let Some(m) = transformation.filter(|m| m.len() >= 8) {
        return AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7]);
    }
    match (tiepoints, pixel_scale) {
        (Some(tie), Some(scale)) if tie.len() >= 6 && scale.len() >= 2 => {
            let (i, j, x, y) = (tie[0], tie[1], tie[3], tie[4]);
            let (sx, sy) = (scale[0], scale[1]);
            AffineTransform::new(sx, 0.0, x - i * sx, 0.0, -sy, y + j * sy)
        }
        _ => AffineTransform::identity(),
    }
}

/// Resolve an EPSG code from a GeoKey directory, preferring the projected
/// system over the geographic one.
pub(crate) fn spatial_ref_from_geokeys(keys: &[u32]) -> SpatialRef {
    if keys.len() < 4 {
        return SpatialRef::unknown();
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(count).collect();
    let lookup = |id: u32| {
        entries
            .iter()
            .find(|entry| entry[0] == id && entry[1] == 0)
            .map(|entry| entry[3])
            .filter(|code| *code != 0 && *code != USER_DEFINED_GEO_KEY_VALUE)
    };
    lookup(PROJECTED_CS_TYPE_GEO_KEY)
        .or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
        .map(SpatialRef::epsg)
        .unwrap_or_default()
}
