//! I/O collaborators of the correction pipeline: GDAL-backed raster reading,
//! GeoTIFF/sidecar/report writers, and capture event sources.
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::types::RasterStack;

pub mod events;
pub use self::events::{EventProvider, LineEvents, ScriptDirectory, ScriptedEvents, TerminalEvents};

pub mod gdal;
pub use self::gdal::{GdalError, GdalMetadata, GdalRasterReader, GdalSource};

pub mod writers;
pub use self::writers::tiff::GTiffSink;

/// Dataset-level metadata items embedded into written rasters
pub type MetadataTags = BTreeMap<String, String>;

/// Anything that can load a raster file into a `RasterStack`
pub trait RasterSource {
    fn read(&self, path: &Path) -> Result<RasterStack>;
}

/// Anything that can persist a `RasterStack` as float32 bands
pub trait RasterSink {
    fn write(&mut self, path: &Path, stack: &RasterStack, tags: &MetadataTags) -> Result<()>;
}
