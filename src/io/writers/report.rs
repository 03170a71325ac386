//! `correction.json`: what was measured and applied for one input file.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::capture::Polygon;
use crate::core::correction::CorrectionFactors;
use crate::core::mask::PanelStatistics;
use crate::error::Result;
use crate::types::ClipWindow;

pub const REPORT_FILE_NAME: &str = "correction.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterSummary {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub geotransform: Option<[f64; 6]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub input: PathBuf,
    pub processed_at: DateTime<Utc>,
    pub top_k: usize,
    pub polygon: Polygon,
    pub statistics: PanelStatistics,
    pub correction: CorrectionFactors,
    pub source: RasterSummary,
    pub clip_window: ClipWindow,
    pub clip_geotransform: Option<[f64; 6]>,
    pub corrected_output: PathBuf,
    pub clipped_output: PathBuf,
}

/// Write `report` as pretty JSON into `output_dir`
pub fn write_report(output_dir: &Path, report: &CorrectionReport) -> Result<PathBuf> {
    let path = output_dir.join(REPORT_FILE_NAME);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)?;
    info!("Created correction report: {:?}", path);
    Ok(path)
}

pub fn read_report(path: &Path) -> Result<CorrectionReport> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
