use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::{Array2, Array3, Axis};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::RasterSource;
use crate::types::{RasterStack, normalize_geotransform};

/// Errors encountered when using the GDAL reader or writer
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2} values")]
    DimensionMismatch(usize, usize, usize),
}

/// Shape and georeferencing of a GDAL dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform, `None` when absent or identity
    pub geotransform: Option<[f64; 6]>,
    /// Projection in WKT format, `None` when empty
    pub projection: Option<String>,
}

/// Reader for GDAL-supported rasters (GeoTIFF and friends).
/// The dataset handle is closed when the reader is dropped.
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

impl GdalRasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = dataset.geo_transform().ok().and_then(normalize_geotransform);
        let projection = Some(dataset.projection()).filter(|p| !p.is_empty());
        Ok(GdalRasterReader {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
            },
        })
    }

    /// Read a single band (1-based index) as an f32 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> std::result::Result<Array2<f32>, GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f32>((0, 0), window, window, None)?;
        let data_vec = buf.data().to_vec();
        let len = data_vec.len();
        Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), data_vec).map_err(
            |_| GdalError::DimensionMismatch(self.metadata.size_x, self.metadata.size_y, len),
        )
    }

    /// Read every band into one (bands, rows, cols) stack
    pub fn read_stack(&self) -> std::result::Result<RasterStack, GdalError> {
        let meta = &self.metadata;
        let mut data = Array3::<f32>::zeros((meta.bands, meta.size_y, meta.size_x));
        for (i, mut slot) in data.axis_iter_mut(Axis(0)).enumerate() {
            slot.assign(&self.read_band(i + 1)?);
        }
        debug!(
            "Read {} band(s) of {}x{}, geotransform {:?}",
            meta.bands, meta.size_x, meta.size_y, meta.geotransform
        );
        Ok(RasterStack::new(data, meta.geotransform).with_projection(meta.projection.clone()))
    }
}

/// `RasterSource` that opens each path with GDAL
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalSource;

impl RasterSource for GdalSource {
    fn read(&self, path: &Path) -> Result<RasterStack> {
        let wrap = |source| Error::SourceRead {
            path: PathBuf::from(path),
            source,
        };
        GdalRasterReader::open(path).and_then(|r| r.read_stack()).map_err(wrap)
    }
}
