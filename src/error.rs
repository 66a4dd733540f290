use std::path::PathBuf;

use thiserror::Error;

pub type ConvertResult<T> = Result<T, ConvertError>;

/// Fatal failures of a conversion run.
///
/// Samples rejected by the fuel/elevation gate are not errors; they are
/// dropped silently and only show up in the run summary counters.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("alignment error: {0}")]
    Alignment(String),

    #[error("unable to read raster {path}: {source}")]
    RasterRead {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("unable to open raster {path}: {source}")]
    RasterOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("stride must be a positive integer, got {0}")]
    InvalidStride(u32),

    #[error("configuration error: {0}")]
    Config(String),

    /// `sink` is the destination path, or a label for writers without one.
    #[error("unable to write scenario to {sink}: {source}")]
    SinkWrite {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scenario encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn alignment(details: impl Into<String>) -> Self {
        Self::Alignment(details.into())
    }

    pub fn invalid_region(details: impl Into<String>) -> Self {
        Self::InvalidRegion(details.into())
    }

    pub fn config(details: impl Into<String>) -> Self {
        Self::Config(details.into())
    }

    /// Raster open/read failures count as alignment failures for callers
    /// that only distinguish input problems from output problems.
    pub fn is_alignment(&self) -> bool {
        matches!(
            self,
            Self::Alignment(_) | Self::RasterRead { .. } | Self::RasterOpen { .. }
        )
    }

    pub fn is_sink_write(&self) -> bool {
        matches!(self, Self::SinkWrite { .. })
    }
}
