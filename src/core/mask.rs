//! Polygon rasterization and panel statistics.
//!
//! A pixel belongs to the region when its center lies inside the ring or on its
//! boundary. Bands are cropped to the region's bounding box and pixels outside
//! the mask are zeroed, so zero doubles as the no-data value when the brightest
//! panel pixels are selected.
use ndarray::{Array2, Array3, Axis, Zip, s};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::capture::Polygon;
use crate::types::{ClipWindow, RasterStack};

/// Binary mask of a polygon over a raster grid, stored over its bounding box.
#[derive(Debug, Clone)]
pub struct RegionMask {
    pub window: ClipWindow,
    /// Shape (window.height, window.width); true inside the region
    pub mask: Array2<bool>,
}

/// Inclusive pixel index range whose centers fall within [lo, hi], clamped to [0, len).
fn center_range(lo: f64, hi: f64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let first = (lo - 0.5).ceil().max(0.0);
    let last = (hi - 0.5).floor().min(len as f64 - 1.0);
    if !(first.is_finite() && last.is_finite()) || last < first {
        return None;
    }
    Some((first as usize, last as usize))
}

impl RegionMask {
    pub fn rasterize(polygon: &Polygon, width: usize, height: usize) -> Self {
        let (min_x, min_y, max_x, max_y) = polygon.bounds();
        let (cols, rows) = match (
            center_range(min_x, max_x, width),
            center_range(min_y, max_y, height),
        ) {
            (Some(c), Some(r)) => (c, r),
            _ => {
                return RegionMask {
                    window: ClipWindow {
                        col_off: 0,
                        row_off: 0,
                        width: 0,
                        height: 0,
                    },
                    mask: Array2::from_elem((0, 0), false),
                };
            }
        };

        let window = ClipWindow {
            col_off: cols.0,
            row_off: rows.0,
            width: cols.1 - cols.0 + 1,
            height: rows.1 - rows.0 + 1,
        };
        let mask = Array2::from_shape_fn((window.height, window.width), |(r, c)| {
            let cx = (window.col_off + c) as f64 + 0.5;
            let cy = (window.row_off + r) as f64 + 0.5;
            polygon.contains(cx, cy)
        });

        RegionMask { window, mask }
    }

    pub fn pixel_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// All bands cropped to the bounding box, with pixels outside the mask set to 0.
    pub fn crop(&self, stack: &RasterStack) -> Array3<f32> {
        let w = self.window;
        let mut out = stack
            .data
            .slice(s![.., w.row_off..w.row_off + w.height, w.col_off..w.col_off + w.width])
            .to_owned();
        for mut band in out.axis_iter_mut(Axis(0)) {
            Zip::from(&mut band).and(&self.mask).for_each(|v, &inside| {
                if !inside {
                    *v = 0.0;
                }
            });
        }
        out
    }
}

/// Mean of the `k` largest non-zero finite values (all of them if fewer
/// survive). Returns 0 when nothing survives.
pub fn top_k_mean<'a, I>(values: I, k: usize) -> (f32, usize)
where
    I: IntoIterator<Item = &'a f32>,
{
    let mut kept: Vec<f32> = values
        .into_iter()
        .copied()
        .filter(|v| *v != 0.0 && v.is_finite())
        .collect();
    if kept.is_empty() || k == 0 {
        return (0.0, kept.len());
    }
    kept.sort_by(|a, b| a.total_cmp(b));
    let top = &kept[kept.len().saturating_sub(k)..];
    let sum: f64 = top.iter().map(|&v| v as f64).sum();
    ((sum / top.len() as f64) as f32, kept.len())
}

/// Panel statistic of one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStatistic {
    pub band: usize,
    /// Non-zero pixels inside the region
    pub valid_pixels: usize,
    /// Mean of the brightest `top_k` valid pixels, 0 when none survive
    pub value: f32,
}

impl BandStatistic {
    pub fn is_degenerate(&self) -> bool {
        self.valid_pixels == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelStatistics {
    pub window: ClipWindow,
    pub region_pixels: usize,
    pub bands: Vec<BandStatistic>,
}

impl PanelStatistics {
    /// One value per band, in band order.
    pub fn values(&self) -> Vec<f32> {
        self.bands.iter().map(|b| b.value).collect()
    }
}

/// Rasterize `polygon` over `stack` and compute the top-`top_k` mean of every band.
pub fn extract_panel_statistics(
    polygon: &Polygon,
    stack: &RasterStack,
    top_k: usize,
) -> PanelStatistics {
    let region = RegionMask::rasterize(polygon, stack.width(), stack.height());
    let cropped = region.crop(stack);
    info!(
        "Panel region: {} pixels in {}x{} window at ({}, {})",
        region.pixel_count(),
        region.window.width,
        region.window.height,
        region.window.col_off,
        region.window.row_off
    );

    let bands = cropped
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(band, values)| {
            let (value, valid_pixels) = top_k_mean(values.iter(), top_k);
            debug!(
                "Band {}: {} valid panel pixels, top-{} mean {}",
                band + 1,
                valid_pixels,
                top_k,
                value
            );
            BandStatistic {
                band,
                valid_pixels,
                value,
            }
        })
        .collect();

    PanelStatistics {
        window: region.window,
        region_pixels: region.pixel_count(),
        bands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelPoint;
    use ndarray::Array3;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Polygon::from_vertices(vec![
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y0),
            PixelPoint::new(x1, y1),
            PixelPoint::new(x0, y1),
            PixelPoint::new(x0, y0),
        ])
        .unwrap()
    }

    /// 5x5 single band with values 1..=25 in row-major order
    fn counting_stack() -> RasterStack {
        let data = Array3::from_shape_fn((1, 5, 5), |(_, r, c)| (r * 5 + c + 1) as f32);
        RasterStack::new(data, None)
    }

    #[test]
    fn top_ten_of_masked_values() {
        // Rows 0..=2 -> values 1..=15; top ten are 6..=15
        let stats = extract_panel_statistics(&rect(0.0, 0.0, 5.0, 3.0), &counting_stack(), 10);
        assert_eq!(stats.region_pixels, 15);
        assert_eq!(stats.bands[0].valid_pixels, 15);
        assert!((stats.values()[0] - 10.5).abs() < 1e-6);
    }

    #[test]
    fn fewer_than_k_values_are_all_averaged() {
        // Centers 1.5..=3.5 -> 3x3 block starting at (1, 1)
        let stats = extract_panel_statistics(&rect(1.0, 1.0, 4.0, 4.0), &counting_stack(), 10);
        assert_eq!(stats.region_pixels, 9);
        assert_eq!(
            stats.window,
            ClipWindow {
                col_off: 1,
                row_off: 1,
                width: 3,
                height: 3
            }
        );
        assert!((stats.values()[0] - 13.0).abs() < 1e-6);
    }

    #[test]
    fn pixel_centers_on_boundary_are_inside() {
        let mask = RegionMask::rasterize(&rect(0.5, 0.5, 2.5, 2.5), 5, 5);
        assert_eq!(mask.pixel_count(), 9);
        let stats = extract_panel_statistics(&rect(0.5, 0.5, 2.5, 2.5), &counting_stack(), 10);
        assert!((stats.values()[0] - 7.0).abs() < 1e-6);
    }

    #[test]
    fn triangle_masks_lower_left_half() {
        let tri = Polygon::from_vertices(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(0.0, 5.0),
            PixelPoint::new(5.0, 5.0),
            PixelPoint::new(0.0, 0.0),
        ])
        .unwrap();
        let mask = RegionMask::rasterize(&tri, 5, 5);
        // Centers with x <= y, diagonal included
        assert_eq!(mask.pixel_count(), 15);
        assert!(mask.mask[[4, 0]]);
        assert!(mask.mask[[2, 2]]);
        assert!(!mask.mask[[0, 4]]);
    }

    #[test]
    fn crop_zeroes_outside_pixels() {
        let tri = Polygon::from_vertices(vec![
            PixelPoint::new(0.0, 0.0),
            PixelPoint::new(0.0, 5.0),
            PixelPoint::new(5.0, 5.0),
        ])
        .unwrap();
        let region = RegionMask::rasterize(&tri, 5, 5);
        let cropped = region.crop(&counting_stack());
        assert_eq!(cropped.dim(), (1, 5, 5));
        assert_eq!(cropped[[0, 0, 4]], 0.0);
        assert_eq!(cropped[[0, 4, 0]], 21.0);
    }

    #[test]
    fn zeros_are_treated_as_no_data() {
        let mut stack = counting_stack();
        // Blank out the brightest row of the region
        stack.data.slice_mut(s![0, 2, ..]).fill(0.0);
        let stats = extract_panel_statistics(&rect(0.0, 0.0, 5.0, 3.0), &stack, 10);
        assert_eq!(stats.bands[0].valid_pixels, 10);
        // Remaining values 1..=10
        assert!((stats.values()[0] - 5.5).abs() < 1e-6);
    }

    #[test]
    fn empty_band_yields_zero_statistic() {
        let data = Array3::<f32>::zeros((2, 4, 4));
        let stack = RasterStack::new(data, None);
        let stats = extract_panel_statistics(&rect(0.0, 0.0, 4.0, 4.0), &stack, 10);
        assert_eq!(stats.values(), vec![0.0, 0.0]);
        assert!(stats.bands.iter().all(|b| b.is_degenerate()));
    }

    #[test]
    fn polygon_outside_raster_is_empty() {
        let mask = RegionMask::rasterize(&rect(20.0, 20.0, 30.0, 30.0), 5, 5);
        assert!(mask.is_empty());
        let stats = extract_panel_statistics(&rect(20.0, 20.0, 30.0, 30.0), &counting_stack(), 10);
        assert_eq!(stats.values(), vec![0.0]);
    }

    #[test]
    fn top_k_mean_handles_small_k() {
        let values = [3.0f32, 0.0, 9.0, 1.0, f32::NAN, 7.0];
        let (mean, valid) = top_k_mean(values.iter(), 2);
        assert_eq!(valid, 4);
        assert!((mean - 8.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_values_keep_their_pixel_count() {
        assert_eq!(top_k_mean(&[-5.0, 0.0, 5.0], 10), (0.0, 2));
    }
}
