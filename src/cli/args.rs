use clap::Parser;
use std::path::PathBuf;

use panelcal::{CorrectionParams, DegeneratePolicy};

#[derive(Parser)]
#[command(name = "panelcal", version, about = "Reflectance-panel radiometric correction")]
pub struct CliArgs {
    /// Input GeoTIFF (single file mode)
    #[arg(short, long, conflicts_with = "input_dir")]
    pub input: Option<PathBuf>,

    /// Input directory containing GeoTIFFs (batch mode)
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output base directory; every input gets a subdirectory named after its stem
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// JSON capture script, replayed for every input
    #[arg(long, conflicts_with = "events_dir")]
    pub events: Option<PathBuf>,

    /// Directory of per-input capture scripts named `<stem>.json`
    #[arg(long)]
    pub events_dir: Option<PathBuf>,

    /// JSON parameter file; command line options override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Snap distance in pixels for closing the polygon on its first vertex
    #[arg(long)]
    pub snap_distance: Option<f64>,

    /// Number of brightest panel pixels averaged per band
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Calibrated panel reflectance in (0, 1]
    #[arg(long)]
    pub reflectance: Option<f32>,

    /// Width of the centered clip in pixels
    #[arg(long)]
    pub clip_width: Option<usize>,

    /// Height of the centered clip in pixels
    #[arg(long)]
    pub clip_height: Option<usize>,

    /// Handling of bands without usable panel pixels (pass-through or fail)
    #[arg(long, value_enum)]
    pub degenerate: Option<DegeneratePolicy>,

    /// Write .tfw/.prj sidecars next to georeferenced outputs
    #[arg(long, default_value_t = false)]
    pub world_file: bool,

    /// Do not write correction.json
    #[arg(long, default_value_t = false)]
    pub no_report: bool,

    /// Batch mode: stop at the first failing file
    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}

impl CliArgs {
    /// Defaults, then the config file, then command line overrides.
    pub fn params(&self) -> panelcal::Result<CorrectionParams> {
        let mut params = match &self.config {
            Some(path) => CorrectionParams::from_json_file(path)?,
            None => CorrectionParams::default(),
        };
        if let Some(v) = self.snap_distance {
            params.snap_distance = v;
        }
        if let Some(v) = self.top_k {
            params.top_k = v;
        }
        if let Some(v) = self.reflectance {
            params.reflectance_factor = v;
        }
        if let Some(v) = self.clip_width {
            params.clip_size.width = v;
        }
        if let Some(v) = self.clip_height {
            params.clip_size.height = v;
        }
        if let Some(v) = self.degenerate {
            params.degenerate_policy = v;
        }
        if self.world_file {
            params.write_world_file = true;
        }
        if self.no_report {
            params.write_report = false;
        }
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = CliArgs::parse_from([
            "panelcal",
            "--input",
            "a.tif",
            "--output-dir",
            "out",
            "--reflectance",
            "0.18",
            "--clip-width",
            "71",
            "--clip-height",
            "103",
            "--degenerate",
            "fail",
        ]);
        let params = args.params().unwrap();
        assert_eq!(params.reflectance_factor, 0.18);
        assert_eq!(params.clip_size.width, 71);
        assert_eq!(params.clip_size.height, 103);
        assert_eq!(params.degenerate_policy, DegeneratePolicy::Fail);
        assert_eq!(params.top_k, 10);
    }

    #[test]
    fn invalid_reflectance_is_rejected() {
        let args = CliArgs::parse_from(["panelcal", "--input", "a.tif", "--reflectance", "2"]);
        assert!(args.params().is_err());
    }

    #[test]
    fn input_and_input_dir_conflict() {
        let parsed = CliArgs::try_parse_from(["panelcal", "--input", "a.tif", "--input-dir", "d"]);
        assert!(parsed.is_err());
    }
}
