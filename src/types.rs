//! Shared types used across panelcal.
//! Includes `PixelPoint`, `RasterStack`, `CaptureEvent`, `ClipWindow`, and the
//! `DegeneratePolicy` switch for bands whose correction factor is unusable.
use clap::ValueEnum;
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// GDAL geotransform that rasterio/GDAL report for rasters without georeferencing.
pub const IDENTITY_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Map the identity transform onto the "no transform" sentinel (`None`).
pub fn normalize_geotransform(gt: [f64; 6]) -> Option<[f64; 6]> {
    if gt == IDENTITY_GEOTRANSFORM {
        None
    } else {
        Some(gt)
    }
}

/// Floating-point pixel coordinates (column, row). Not tied to any CRS.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One event of the capture input stream.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureEvent {
    PointClick { x: f64, y: f64 },
    Commit,
}

/// All bands of one raster plus its georeferencing.
///
/// `data` has shape (bands, rows, cols). `geotransform` is `None` when the source
/// carried no transform or the identity transform.
#[derive(Debug, Clone)]
pub struct RasterStack {
    pub data: Array3<f32>,
    pub geotransform: Option<[f64; 6]>,
    pub projection: Option<String>,
}

impl RasterStack {
    pub fn new(data: Array3<f32>, geotransform: Option<[f64; 6]>) -> Self {
        Self {
            data,
            geotransform,
            projection: None,
        }
    }

    pub fn with_projection(mut self, projection: Option<String>) -> Self {
        self.projection = projection.filter(|p| !p.is_empty());
        self
    }

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn width(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Zero-based band view of shape (rows, cols).
    pub fn band(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }
}

/// Integer window inside a raster, in pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

/// What to do with a band whose panel statistic cannot produce a usable factor.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Copy the band unchanged and log a warning.
    #[default]
    PassThrough,
    /// Fail the file with a reported error.
    Fail,
}

impl std::fmt::Display for DegeneratePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegeneratePolicy::PassThrough => write!(f, "PassThrough"),
            DegeneratePolicy::Fail => write!(f, "Fail"),
        }
    }
}
