use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Sidecar extension for an image extension: `tif` -> `tfw`, otherwise first and
/// last letter plus `w`.
fn world_extension(image_ext: &str) -> String {
    match image_ext {
        "tif" | "tiff" => "tfw".to_string(),
        "" => "wld".to_string(),
        other => {
            let mut chars = other.chars();
            let first = chars.next().unwrap_or('w');
            let last = chars.last().unwrap_or(first);
            format!("{}{}w", first, last)
        }
    }
}

/// Write a world file next to the raster image using the provided geotransform.
/// The world file stores the transform in pixel-center convention.
pub fn write_world_file(output_image: &Path, geotransform: [f64; 6]) -> Result<PathBuf> {
    let ext = output_image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let world_path = output_image.with_extension(world_extension(&ext));

    // A/E: pixel size, D/B: rotation, C/F: center of the upper-left pixel
    let a = geotransform[1];
    let d = geotransform[4];
    let b = geotransform[2];
    let e = geotransform[5];
    let c = geotransform[0] + 0.5 * a + 0.5 * b;
    let f = geotransform[3] + 0.5 * d + 0.5 * e;

    let mut file = File::create(&world_path)?;
    for value in [a, d, b, e, c, f] {
        writeln!(file, "{:.12}", value)?;
    }

    Ok(world_path)
}

/// Write a .prj file with the provided projection (WKT or EPSG:XXXX)
pub fn write_prj_file(output_image: &Path, projection: &str) -> Result<PathBuf> {
    let prj_path = output_image.with_extension("prj");
    std::fs::write(&prj_path, projection.as_bytes())?;
    Ok(prj_path)
}
