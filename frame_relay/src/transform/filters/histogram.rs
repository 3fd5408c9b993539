// THEORY:
// Tone-curve operations on a single 8-bit plane:
// 1.  **Global equalisation** (`imgproc::equalize_hist`) flattens the histogram
//     of the whole plane.
// 2.  **CLAHE** (`imgproc::create_clahe`) equalises each tile of an 8x8 grid
//     with the histogram clipped at `clip_limit`, blending neighbouring tiles
//     so the seams do not show.
// 3.  **Log curve** compresses highlights with `ln(1 + v)` and stretches the
//     result back over the full 0..255 range.

use image::GrayImage;
use opencv::core::{self, Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;

use super::mat::{from_mat, to_mat};
use crate::error::Result;

pub const CLAHE_GRID: i32 = 8;

pub fn equalize(plane: &GrayImage) -> Result<GrayImage> {
    let src = to_mat(plane)?;
    if src.empty() {
        return Ok(plane.clone());
    }
    let mut out = Mat::default();
    imgproc::equalize_hist(&src, &mut out)?;
    from_mat(&out)
}

pub fn clahe(plane: &GrayImage, clip_limit: f64) -> Result<GrayImage> {
    let src = to_mat(plane)?;
    if src.empty() {
        return Ok(plane.clone());
    }
    let mut clahe = imgproc::create_clahe(clip_limit, Size::new(CLAHE_GRID, CLAHE_GRID))?;
    let mut out = Mat::default();
    clahe.apply(&src, &mut out)?;
    from_mat(&out)
}

/// `ln(1 + v)`, min-max normalised back to 0..=255. A flat plane maps to 0.
pub fn log_stretch(plane: &GrayImage) -> Result<GrayImage> {
    let (Some(&lo), Some(&hi)) = (plane.as_raw().iter().min(), plane.as_raw().iter().max()) else {
        return Ok(plane.clone());
    };
    if lo == hi {
        return Ok(GrayImage::new(plane.width(), plane.height()));
    }

    let src = to_mat(plane)?;
    let mut shifted = Mat::default();
    src.convert_to(&mut shifted, core::CV_32F, 1.0, 1.0)?;
    let mut logged = Mat::default();
    core::log(&shifted, &mut logged)?;

    let (lo, hi) = ((1.0 + lo as f64).ln(), (1.0 + hi as f64).ln());
    let scale = 255.0 / (hi - lo);
    let mut out = Mat::default();
    logged.convert_to(&mut out, core::CV_8U, scale, -lo * scale)?;
    from_mat(&out)
}
