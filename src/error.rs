//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Carries the file-scoped failure kinds of the correction pipeline and wraps
//! GDAL, I/O, and JSON errors from the collaborators.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Polygon capture ended before the region was closed")]
    IncompletePolygon,

    #[error("No non-zero pixels inside the panel region for band {band}")]
    DegenerateStatistic { band: usize },

    #[error("Unusable correction factor for band {band} (panel statistic {statistic})")]
    ZeroCorrectionFactor { band: usize, statistic: f32 },

    #[error(
        "Clip window {requested_width}x{requested_height} does not fit source {source_width}x{source_height}"
    )]
    WindowOutOfBounds {
        requested_width: usize,
        requested_height: usize,
        source_width: usize,
        source_height: usize,
    },

    #[error("Failed to read raster {}: {source}", .path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: crate::io::GdalError,
    },

    #[error("Failed to write raster {}: {source}", .path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: crate::io::GdalError,
    },

    #[error(
        "Output folder {} of {} is already used by {}",
        .output_dir.display(),
        .input.display(),
        .claimed_by.display()
    )]
    OutputCollision {
        input: PathBuf,
        output_dir: PathBuf,
        claimed_by: PathBuf,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Cannot parse capture event on line {line}: {input:?}")]
    EventParse { line: usize, input: String },
}

impl Error {
    /// True for failures that only skip or fail the current file in a batch.
    pub fn is_file_scoped(&self) -> bool {
        !matches!(self, Error::InvalidArgument { .. })
    }
}
