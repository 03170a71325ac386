//! Centered window extraction with geotransform recomputation.
use ndarray::s;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{ClipWindow, RasterStack};

/// Window of `width` x `height` centered on a `src_width` x `src_height` raster.
/// Offsets use floor division; a request larger than the source is an error.
pub fn centered_window(
    src_width: usize,
    src_height: usize,
    width: usize,
    height: usize,
) -> Result<ClipWindow> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument {
            arg: "clip_size",
            value: format!("{}x{}", width, height),
        });
    }
    if width > src_width || height > src_height {
        return Err(Error::WindowOutOfBounds {
            requested_width: width,
            requested_height: height,
            source_width: src_width,
            source_height: src_height,
        });
    }
    Ok(ClipWindow {
        col_off: (src_width - width) / 2,
        row_off: (src_height - height) / 2,
        width,
        height,
    })
}

/// Geotransform of `window`: the source transform translated by the window's
/// pixel offset. Pixel size and rotation are unchanged; `None` stays `None`.
pub fn window_geotransform(gt: Option<[f64; 6]>, window: &ClipWindow) -> Option<[f64; 6]> {
    gt.map(|mut gt| {
        let (col, row) = (window.col_off as f64, window.row_off as f64);
        let origin_x = gt[0] + col * gt[1] + row * gt[2];
        let origin_y = gt[3] + col * gt[4] + row * gt[5];
        gt[0] = origin_x;
        gt[3] = origin_y;
        gt
    })
}

/// Extract `window` from all bands of `stack`.
pub fn clip_stack(stack: &RasterStack, window: &ClipWindow) -> Result<RasterStack> {
    if window.col_off + window.width > stack.width()
        || window.row_off + window.height > stack.height()
    {
        return Err(Error::WindowOutOfBounds {
            requested_width: window.width,
            requested_height: window.height,
            source_width: stack.width(),
            source_height: stack.height(),
        });
    }
    let data = stack
        .data
        .slice(s![
            ..,
            window.row_off..window.row_off + window.height,
            window.col_off..window.col_off + window.width
        ])
        .to_owned();
    Ok(RasterStack {
        data,
        geotransform: window_geotransform(stack.geotransform, window),
        projection: stack.projection.clone(),
    })
}

/// Centered `width` x `height` clip of `stack`, plus the window it was taken from.
pub fn clip_centered(
    stack: &RasterStack,
    width: usize,
    height: usize,
) -> Result<(RasterStack, ClipWindow)> {
    let window = centered_window(stack.width(), stack.height(), width, height)?;
    info!(
        "Clip window {}x{} at offset ({}, {})",
        window.width, window.height, window.col_off, window.row_off
    );
    Ok((clip_stack(stack, &window)?, window))
}
