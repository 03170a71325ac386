//! Output writers: float32 GeoTIFF, world file / `.prj` sidecars, and the JSON
//! correction report.
pub mod report;
pub mod tiff;
pub mod worldfile;
