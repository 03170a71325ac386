//! Per-band reflectance correction.
//!
//! The factor of band `i` is `m_i / r`, where `m_i` is the panel statistic and
//! `r` the calibrated panel reflectance. Correcting divides every pixel by the
//! factor (`v * r / m_i`). Bands without a usable factor follow the configured
//! `DegeneratePolicy`.
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::mask::BandStatistic;
use crate::error::{Error, Result};
use crate::types::DegeneratePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandCorrection {
    pub band: usize,
    /// Raw panel statistic `m_i`
    pub statistic: f32,
    /// `m_i / r`, or `None` when the band is passed through unchanged
    pub factor: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFactors {
    pub reflectance_factor: f32,
    pub bands: Vec<BandCorrection>,
}

fn usable(statistic: f32, factor: f32, reflectance: f32) -> bool {
    statistic.is_finite()
        && statistic > 0.0
        && factor.is_finite()
        && factor > 0.0
        && (reflectance / statistic).is_finite()
}

impl CorrectionFactors {
    /// Derive one factor per band from the panel statistics.
    pub fn derive(
        statistics: &[BandStatistic],
        reflectance_factor: f32,
        policy: DegeneratePolicy,
    ) -> Result<Self> {
        if !(reflectance_factor.is_finite() && reflectance_factor > 0.0 && reflectance_factor <= 1.0)
        {
            return Err(Error::InvalidArgument {
                arg: "reflectance_factor",
                value: reflectance_factor.to_string(),
            });
        }

        let mut bands = Vec::with_capacity(statistics.len());
        for (band, stat) in statistics.iter().enumerate() {
            let statistic = stat.value;
            let factor = statistic / reflectance_factor;
            if usable(statistic, factor, reflectance_factor) {
                info!(
                    "Band {}: panel statistic {}, correction factor {}",
                    band + 1,
                    statistic,
                    factor
                );
                bands.push(BandCorrection {
                    band,
                    statistic,
                    factor: Some(factor),
                });
                continue;
            }

            if policy == DegeneratePolicy::Fail {
                return Err(if stat.is_degenerate() {
                    Error::DegenerateStatistic { band }
                } else {
                    Error::ZeroCorrectionFactor { band, statistic }
                });
            }
            warn!(
                "Band {}: unusable panel statistic {}; band passed through uncorrected",
                band + 1,
                statistic
            );
            bands.push(BandCorrection {
                band,
                statistic,
                factor: None,
            });
        }

        Ok(Self {
            reflectance_factor,
            bands,
        })
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Factors in band order, `None` for pass-through bands.
    pub fn factors(&self) -> Vec<Option<f32>> {
        self.bands.iter().map(|b| b.factor).collect()
    }

    fn check_bands(&self, data: &Array3<f32>) -> Result<()> {
        let bands = data.len_of(Axis(0));
        if bands != self.bands.len() {
            return Err(Error::InvalidArgument {
                arg: "bands",
                value: format!("image has {} bands, {} factors", bands, self.bands.len()),
            });
        }
        Ok(())
    }

    fn map_bands(
        &self,
        data: &Array3<f32>,
        op: impl Fn(f32, f32) -> f32 + Sync,
    ) -> Result<Array3<f32>> {
        self.check_bands(data)?;
        let mut out = data.to_owned();
        for (mut band, correction) in out.axis_iter_mut(Axis(0)).zip(&self.bands) {
            if let Some(factor) = correction.factor {
                band.par_mapv_inplace(|v| op(v, factor));
            }
        }
        Ok(out)
    }

    /// Corrected copy of `data`: `v / factor` per band. Shape and band order are kept.
    pub fn apply(&self, data: &Array3<f32>) -> Result<Array3<f32>> {
        self.map_bands(data, |v, factor| v / factor)
    }

    /// Inverse of [`apply`](Self::apply): `v * factor` per band.
    pub fn revert(&self, data: &Array3<f32>) -> Result<Array3<f32>> {
        self.map_bands(data, |v, factor| v * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Statistics as `top_k_mean` would report them: zero means no valid pixels
    fn stats(values: &[f32]) -> Vec<BandStatistic> {
        values
            .iter()
            .enumerate()
            .map(|(band, &value)| BandStatistic {
                band,
                valid_pixels: usize::from(value != 0.0),
                value,
            })
            .collect()
    }

    #[test]
    fn factor_is_statistic_over_reflectance() {
        let f =
            CorrectionFactors::derive(&stats(&[100.0, 40.0]), 0.5, DegeneratePolicy::Fail).unwrap();
        assert_eq!(f.factors(), vec![Some(200.0), Some(80.0)]);
    }

    #[test]
    fn apply_divides_by_factor() {
        let f = CorrectionFactors::derive(&stats(&[100.0]), 0.5, DegeneratePolicy::Fail).unwrap();
        let data = Array3::from_elem((1, 2, 2), 50.0f32);
        let out = f.apply(&data).unwrap();
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-7));
    }

    #[test]
    fn revert_restores_original_values() {
        let panel = stats(&[123.4, 0.731, 9876.5]);
        let f = CorrectionFactors::derive(&panel, 0.35, DegeneratePolicy::Fail).unwrap();
        let data = Array3::from_shape_fn((3, 4, 6), |(b, r, c)| {
            (b as f32 + 1.0) * 17.3 + r as f32 * 2.9 + c as f32 * 0.41
        });
        let back = f.revert(&f.apply(&data).unwrap()).unwrap();
        for (a, b) in data.iter().zip(back.iter()) {
            assert!((a - b).abs() <= a.abs() * 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn zero_statistic_passes_through_by_default() {
        let f = CorrectionFactors::derive(&stats(&[0.0, 10.0]), 1.0, DegeneratePolicy::PassThrough)
            .unwrap();
        assert_eq!(f.factors(), vec![None, Some(10.0)]);

        let data = Array3::from_elem((2, 3, 3), 5.0f32);
        let out = f.apply(&data).unwrap();
        assert!(out.index_axis(Axis(0), 0).iter().all(|&v| v == 5.0));
        assert!(out.index_axis(Axis(0), 1).iter().all(|&v| (v - 0.5).abs() < 1e-7));
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn fail_policy_reports_degenerate_bands() {
        assert!(matches!(
            CorrectionFactors::derive(&stats(&[5.0, 0.0]), 0.5, DegeneratePolicy::Fail),
            Err(Error::DegenerateStatistic { band: 1 })
        ));
        assert!(matches!(
            CorrectionFactors::derive(&stats(&[-3.0]), 0.5, DegeneratePolicy::Fail),
            Err(Error::ZeroCorrectionFactor { band: 0, .. })
        ));
        assert!(matches!(
            CorrectionFactors::derive(&stats(&[f32::NAN]), 0.5, DegeneratePolicy::Fail),
            Err(Error::ZeroCorrectionFactor { band: 0, .. })
        ));
    }

    #[test]
    fn zero_mean_with_valid_pixels_is_an_unusable_factor() {
        // Panel values [-5, 5]: two surviving pixels averaging to 0
        let panel = [BandStatistic {
            band: 0,
            valid_pixels: 2,
            value: 0.0,
        }];
        assert!(matches!(
            CorrectionFactors::derive(&panel, 0.5, DegeneratePolicy::Fail),
            Err(Error::ZeroCorrectionFactor { band: 0, statistic }) if statistic == 0.0
        ));

        let passed =
            CorrectionFactors::derive(&panel, 0.5, DegeneratePolicy::PassThrough).unwrap();
        assert_eq!(passed.factors(), vec![None]);
    }

    #[test]
    fn band_count_mismatch_is_rejected() {
        let f = CorrectionFactors::derive(&stats(&[1.0]), 0.5, DegeneratePolicy::Fail).unwrap();
        let data = Array3::<f32>::zeros((2, 2, 2));
        assert!(matches!(f.apply(&data), Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn invalid_reflectance_is_rejected() {
        let panel = stats(&[1.0]);
        assert!(CorrectionFactors::derive(&panel, 0.0, DegeneratePolicy::PassThrough).is_err());
        assert!(CorrectionFactors::derive(&panel, 1.2, DegeneratePolicy::PassThrough).is_err());
    }
}
