use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::DegeneratePolicy;

/// Target size of the centered clip, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSize {
    pub width: usize,
    pub height: usize,
}

impl Default for ClipSize {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1300,
        }
    }
}

/// Correction parameters suitable for config files and CLI overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionParams {
    /// Distance in pixels within which a click snaps onto the first vertex
    pub snap_distance: f64,
    /// Number of brightest non-zero panel pixels averaged per band
    pub top_k: usize,
    /// Calibrated reflectance of the panel, in (0, 1]
    pub reflectance_factor: f32,
    pub clip_size: ClipSize,
    pub degenerate_policy: DegeneratePolicy,
    /// Write `.tfw`/`.prj` sidecars next to georeferenced outputs
    pub write_world_file: bool,
    /// Write `correction.json` next to the outputs
    pub write_report: bool,
}

impl Default for CorrectionParams {
    fn default() -> Self {
        Self {
            snap_distance: 5.0,
            top_k: 10,
            reflectance_factor: 0.5,
            clip_size: ClipSize::default(),
            degenerate_policy: DegeneratePolicy::PassThrough,
            write_world_file: false,
            write_report: true,
        }
    }
}

impl CorrectionParams {
    /// Load parameters from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: CorrectionParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let r = self.reflectance_factor;
        if !(r.is_finite() && r > 0.0 && r <= 1.0) {
            return Err(Error::InvalidArgument {
                arg: "reflectance_factor",
                value: r.to_string(),
            });
        }
        if self.top_k == 0 {
            return Err(Error::InvalidArgument {
                arg: "top_k",
                value: "0".to_string(),
            });
        }
        if !(self.snap_distance.is_finite() && self.snap_distance >= 0.0) {
            return Err(Error::InvalidArgument {
                arg: "snap_distance",
                value: self.snap_distance.to_string(),
            });
        }
        if self.clip_size.width == 0 || self.clip_size.height == 0 {
            return Err(Error::InvalidArgument {
                arg: "clip_size",
                value: format!("{}x{}", self.clip_size.width, self.clip_size.height),
            });
        }
        Ok(())
    }
}
