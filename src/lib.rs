#![doc = r#"
panelcal: reflectance-panel radiometric correction for multi-band rasters.

An operator outlines a reference panel of known reflectance on an image. panelcal
rasterizes that polygon, averages the brightest non-zero panel pixels of every
band, divides each band by `statistic / reflectance`, and writes a full-size
corrected GeoTIFF plus a fixed-size clip centered on the image, with the clip's
geotransform shifted to the window origin.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Correct a stack in memory
-------------------------
```rust
use ndarray::Array3;
use panelcal::{CaptureEvent, CorrectionParams, RasterStack, correct_stack};
use panelcal::core::params::ClipSize;

fn main() -> panelcal::Result<()> {
    let mut data = Array3::<f32>::from_elem((3, 20, 20), 50.0);
    data.slice_mut(ndarray::s![0, 2..6, 2..6]).fill(100.0);
    let stack = RasterStack::new(data, None);

    let events = [
        CaptureEvent::PointClick { x: 2.0, y: 2.0 },
        CaptureEvent::PointClick { x: 6.0, y: 2.0 },
        CaptureEvent::PointClick { x: 6.0, y: 6.0 },
        CaptureEvent::PointClick { x: 2.0, y: 6.0 },
        CaptureEvent::Commit,
    ];
    let params = CorrectionParams {
        clip_size: ClipSize { width: 10, height: 10 },
        ..Default::default()
    };

    let products = correct_stack(&stack, events.into_iter().map(Ok), &params)?;
    assert_eq!(products.factors.bands[0].factor, Some(200.0));
    assert_eq!(products.corrected.data[[0, 10, 10]], 0.25);
    Ok(())
}
```

Process a directory of GeoTIFFs
-------------------------------
```rust,no_run
use std::path::Path;
use panelcal::{CorrectionParams, ScriptDirectory, process_directory_to_path};

fn main() -> panelcal::Result<()> {
    // One `<stem>.json` capture script per raster
    let mut events = ScriptDirectory::new("/data/polygons");
    let report = process_directory_to_path(
        Path::new("/data/images"),
        Path::new("/data/corrected"),
        &mut events,
        &CorrectionParams::default(),
        true, // continue_on_error
    )?;
    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Useful modules
--------------
- [`api`]: per-file and batch entry points.
- [`core`]: capture state machine, panel statistics, correction, clipping.
- [`io`]: GDAL reader, GeoTIFF/sidecar/report writers, capture event sources.
- [`error`]: crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Types
pub use crate::core::capture::{CaptureSession, CaptureState, Polygon, PolygonCapture, capture_polygon};
pub use crate::core::clip::{centered_window, clip_centered, clip_stack, window_geotransform};
pub use crate::core::correction::{BandCorrection, CorrectionFactors};
pub use crate::core::mask::{PanelStatistics, RegionMask, extract_panel_statistics};
pub use crate::core::params::{ClipSize, CorrectionParams};
pub use error::{Error, Result};
pub use types::{CaptureEvent, ClipWindow, DegeneratePolicy, PixelPoint, RasterStack};

// I/O
pub use io::{
    EventProvider, GTiffSink, GdalRasterReader, GdalSource, LineEvents, RasterSink,
    RasterSource, ScriptDirectory, ScriptedEvents, TerminalEvents,
};

// High-level API
pub use api::{
    BatchReport, CorrectedOutputs, CorrectionProducts, FileOutcome, correct_stack,
    process_directory_to_path, process_directory_with, process_file, process_path,
};
