use gdal::raster::{Buffer, ColorInterpretation};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Axis;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::io::gdal::GdalError;
use crate::io::{MetadataTags, RasterSink};
use crate::types::RasterStack;

/// Create a float32 GTiff holding every band of `stack`, with its geotransform and
/// projection when present. The returned dataset is closed when dropped.
pub fn write_tiff_f32(
    output: &Path,
    stack: &RasterStack,
    tags: &MetadataTags,
) -> std::result::Result<Dataset, GdalError> {
    let (cols, rows, bands) = (stack.width(), stack.height(), stack.band_count());
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<f32, _>(output, cols, rows, bands)?;

    if let Some(gt) = stack.geotransform {
        ds.set_geo_transform(&gt)?;
        if let Some(projection) = stack.projection.as_deref() {
            ds.set_projection(projection)?;
        }
    }
    for (key, value) in tags {
        ds.set_metadata_item(key, value, "")?;
    }

    for (i, band_data) in stack.data.axis_iter(Axis(0)).enumerate() {
        let mut band = ds.rasterband(i + 1)?;
        band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        let mut buf = Buffer::new((cols, rows), band_data.iter().copied().collect());
        band.write((0, 0), (cols, rows), &mut buf)?;
    }

    Ok(ds)
}

/// `RasterSink` writing float32 GeoTIFFs through GDAL
#[derive(Debug, Default, Clone, Copy)]
pub struct GTiffSink;

impl RasterSink for GTiffSink {
    fn write(&mut self, path: &Path, stack: &RasterStack, tags: &MetadataTags) -> Result<()> {
        match write_tiff_f32(path, stack, tags) {
            Ok(ds) => {
                drop(ds);
                info!(
                    "Wrote {}x{}x{} float32 GeoTIFF: {:?}",
                    stack.band_count(),
                    stack.height(),
                    stack.width(),
                    path
                );
                Ok(())
            }
            Err(source) => {
                if path.exists() {
                    if let Err(e) = std::fs::remove_file(path) {
                        warn!("Could not remove partial output {:?}: {}", path, e);
                    }
                }
                Err(Error::SinkWrite {
                    path: PathBuf::from(path),
                    source,
                })
            }
        }
    }
}
