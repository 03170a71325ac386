//! High-level library API: correct one raster in memory, process a file into
//! its output directory, or walk a directory of rasters sequentially. Prefer
//! these entrypoints over the low-level `core` modules when integrating panelcal.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::capture::{Polygon, capture_polygon};
use crate::core::clip::{centered_window, clip_stack};
use crate::core::correction::CorrectionFactors;
use crate::core::mask::{PanelStatistics, extract_panel_statistics};
use crate::core::params::CorrectionParams;
use crate::error::{Error, Result};
use crate::io::writers::report::{CorrectionReport, RasterSummary, write_report};
use crate::io::writers::worldfile::{write_prj_file, write_world_file};
use crate::io::{EventProvider, GTiffSink, GdalSource, MetadataTags, RasterSink, RasterSource};
use crate::types::{CaptureEvent, ClipWindow, RasterStack};

pub const CORRECTED_FILE_NAME: &str = "corrected_image.tif";
pub const CLIPPED_FILE_NAME: &str = "clipped_image.tif";

/// Everything derived from one raster and one closed polygon
#[derive(Debug, Clone)]
pub struct CorrectionProducts {
    pub polygon: Polygon,
    pub statistics: PanelStatistics,
    pub factors: CorrectionFactors,
    pub corrected: RasterStack,
    pub clipped: RasterStack,
    pub window: ClipWindow,
}

/// Paths written for a corrected input
#[derive(Debug, Clone)]
pub struct CorrectedOutputs {
    pub output_dir: PathBuf,
    pub corrected: PathBuf,
    pub clipped: PathBuf,
    pub report: Option<PathBuf>,
    pub factors: CorrectionFactors,
    pub window: ClipWindow,
}

#[derive(Debug, Clone)]
pub enum FileOutcome {
    Corrected(CorrectedOutputs),
    /// The operator never closed a polygon; nothing was written
    Skipped,
}

/// Output directory for `input` under `output_base`, named after the file stem
pub fn output_dir_for(input: &Path, output_base: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    output_base.join(stem)
}

/// Run capture, panel statistics, correction, and clipping on an in-memory stack.
pub fn correct_stack<E>(
    stack: &RasterStack,
    events: E,
    params: &CorrectionParams,
) -> Result<CorrectionProducts>
where
    E: IntoIterator<Item = Result<CaptureEvent>>,
{
    params.validate()?;
    // Reject an impossible clip before asking for a polygon
    let window = centered_window(
        stack.width(),
        stack.height(),
        params.clip_size.width,
        params.clip_size.height,
    )?;

    let polygon = capture_polygon(events, params.snap_distance, stack.width(), stack.height())?;
    let statistics = extract_panel_statistics(&polygon, stack, params.top_k);
    let factors = CorrectionFactors::derive(
        &statistics.bands,
        params.reflectance_factor,
        params.degenerate_policy,
    )?;

    let corrected = RasterStack {
        data: factors.apply(&stack.data)?,
        geotransform: stack.geotransform,
        projection: stack.projection.clone(),
    };
    let clipped = clip_stack(&corrected, &window)?;

    Ok(CorrectionProducts {
        polygon,
        statistics,
        factors,
        corrected,
        clipped,
        window,
    })
}

fn metadata_tags(factors: &CorrectionFactors, params: &CorrectionParams) -> MetadataTags {
    let mut tags = MetadataTags::new();
    tags.insert("PROCESSING".to_string(), "panel_reflectance_correction".to_string());
    tags.insert(
        "REFLECTANCE_FACTOR".to_string(),
        factors.reflectance_factor.to_string(),
    );
    tags.insert("PANEL_TOP_K".to_string(), params.top_k.to_string());
    let list = factors
        .bands
        .iter()
        .map(|b| b.factor.map_or_else(|| "none".to_string(), |f| f.to_string()))
        .collect::<Vec<_>>()
        .join(",");
    tags.insert("CORRECTION_FACTORS".to_string(), list);
    tags
}

fn write_sidecars(image: &Path, stack: &RasterStack) -> Result<()> {
    if let Some(gt) = stack.geotransform {
        write_world_file(image, gt)?;
        if let Some(projection) = stack.projection.as_deref() {
            write_prj_file(image, projection)?;
        }
    }
    Ok(())
}

/// Process one raster read through `source` and written through `sink` into
/// `output_dir`. An unclosed polygon skips the file without writing anything.
pub fn process_file<S, W, P>(
    input: &Path,
    output_dir: &Path,
    source: &S,
    sink: &mut W,
    events: &mut P,
    params: &CorrectionParams,
) -> Result<FileOutcome>
where
    S: RasterSource + ?Sized,
    W: RasterSink + ?Sized,
    P: EventProvider + ?Sized,
{
    let stack = source.read(input)?;
    info!(
        "Loaded {:?}: {}x{} pixels, {} band(s)",
        input,
        stack.width(),
        stack.height(),
        stack.band_count()
    );

    params.validate()?;
    centered_window(
        stack.width(),
        stack.height(),
        params.clip_size.width,
        params.clip_size.height,
    )?;

    let products = match events
        .events_for(input, &stack)
        .and_then(|events| correct_stack(&stack, events, params))
    {
        Ok(products) => products,
        Err(Error::IncompletePolygon) => {
            warn!("No polygon was closed for {:?}; skipping correction", input);
            return Ok(FileOutcome::Skipped);
        }
        Err(e) => return Err(e),
    };
    drop(stack);

    std::fs::create_dir_all(output_dir)?;
    let corrected_path = output_dir.join(CORRECTED_FILE_NAME);
    let clipped_path = output_dir.join(CLIPPED_FILE_NAME);
    let tags = metadata_tags(&products.factors, params);

    sink.write(&corrected_path, &products.corrected, &tags)?;
    sink.write(&clipped_path, &products.clipped, &tags)?;

    if params.write_world_file {
        write_sidecars(&corrected_path, &products.corrected)?;
        write_sidecars(&clipped_path, &products.clipped)?;
    }

    let report = if params.write_report {
        let report = CorrectionReport {
            input: input.to_path_buf(),
            processed_at: chrono::Utc::now(),
            top_k: params.top_k,
            polygon: products.polygon.clone(),
            statistics: products.statistics.clone(),
            correction: products.factors.clone(),
            source: RasterSummary {
                width: products.corrected.width(),
                height: products.corrected.height(),
                bands: products.corrected.band_count(),
                geotransform: products.corrected.geotransform,
            },
            clip_window: products.window,
            clip_geotransform: products.clipped.geotransform,
            corrected_output: corrected_path.clone(),
            clipped_output: clipped_path.clone(),
        };
        Some(write_report(output_dir, &report)?)
    } else {
        None
    };

    Ok(FileOutcome::Corrected(CorrectedOutputs {
        output_dir: output_dir.to_path_buf(),
        corrected: corrected_path,
        clipped: clipped_path,
        report,
        factors: products.factors,
        window: products.window,
    }))
}

/// Process one GeoTIFF into `<output_base>/<stem>/` using GDAL.
pub fn process_path<P: EventProvider + ?Sized>(
    input: &Path,
    output_base: &Path,
    events: &mut P,
    params: &CorrectionParams,
) -> Result<FileOutcome> {
    process_file(
        input,
        &output_dir_for(input, output_base),
        &GdalSource,
        &mut GTiffSink,
        events,
        params,
    )
}

/// Batch processing report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// GeoTIFF files (`.tif`/`.tiff`, any case) directly inside `input_dir`, sorted by path
pub fn list_rasters(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        let is_tiff = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
            .unwrap_or(false);
        if path.is_file() && is_tiff {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Process every raster of `input_dir` one after another into `output_dir`.
/// With `continue_on_error`, file-scoped failures are logged and counted and the
/// batch moves on; otherwise the first failure is returned. A file whose output
/// folder was already used by an earlier file of the batch (`a.tif` and `a.TIFF`)
/// is not processed and counts as an error.
pub fn process_directory_with<S, W, P>(
    input_dir: &Path,
    output_dir: &Path,
    source: &S,
    sink: &mut W,
    events: &mut P,
    params: &CorrectionParams,
    continue_on_error: bool,
) -> Result<BatchReport>
where
    S: RasterSource + ?Sized,
    W: RasterSink + ?Sized,
    P: EventProvider + ?Sized,
{
    params.validate()?;
    std::fs::create_dir_all(output_dir)?;

    let mut report = BatchReport::default();
    // Output folders claimed so far, compared case-insensitively
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    for path in list_rasters(input_dir)? {
        let file_output = output_dir_for(&path, output_dir);
        let key = file_output.to_string_lossy().to_lowercase();
        if let Some(owner) = claimed.get(&key) {
            let e = Error::OutputCollision {
                input: path.clone(),
                output_dir: file_output,
                claimed_by: owner.clone(),
            };
            warn!("Skipping {:?}: {}", path, e);
            report.errors += 1;
            if !continue_on_error {
                return Err(e);
            }
            continue;
        }
        claimed.insert(key, path.clone());
        info!("Processing: {:?} -> {:?}", path, file_output);

        match process_file(&path, &file_output, source, sink, events, params) {
            Ok(FileOutcome::Corrected(_)) => {
                info!("Successfully processed: {:?}", path);
                report.processed += 1;
            }
            Ok(FileOutcome::Skipped) => report.skipped += 1,
            Err(e) => {
                warn!("Error processing {:?}: {}", path, e);
                report.errors += 1;
                if !continue_on_error || !e.is_file_scoped() {
                    return Err(e);
                }
            }
        }
    }

    info!(
        "Batch complete: processed={} skipped={} errors={}",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}

/// GDAL-backed variant of [`process_directory_with`].
pub fn process_directory_to_path<P: EventProvider + ?Sized>(
    input_dir: &Path,
    output_dir: &Path,
    events: &mut P,
    params: &CorrectionParams,
    continue_on_error: bool,
) -> Result<BatchReport> {
    process_directory_with(
        input_dir,
        output_dir,
        &GdalSource,
        &mut GTiffSink,
        events,
        params,
        continue_on_error,
    )
}
