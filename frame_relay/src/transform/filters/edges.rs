//! Edge detectors on a gray plane.

use image::GrayImage;
use opencv::core::{self, Mat};
use opencv::imgproc;
use opencv::prelude::*;

use super::mat::{from_mat, to_mat};
use crate::error::Result;

pub const CANNY_LOW: f64 = 100.0;
pub const CANNY_HIGH: f64 = 200.0;
const APERTURE: i32 = 3;

/// Binary Canny edge map (0 or 255).
pub fn canny(img: &GrayImage, low: f64, high: f64) -> Result<GrayImage> {
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(img.clone());
    }
    let mut out = Mat::default();
    imgproc::canny(&src, &mut out, low, high, APERTURE, false)?;
    from_mat(&out)
}

/// Gradient magnitude `sqrt(gx^2 + gy^2)` of 3x3 Sobel derivatives, saturated
/// to 8 bits.
pub fn sobel_magnitude(img: &GrayImage) -> Result<GrayImage> {
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(img.clone());
    }
    let mut gx = Mat::default();
    let mut gy = Mat::default();
    imgproc::sobel(&src, &mut gx, core::CV_32F, 1, 0, APERTURE, 1.0, 0.0, core::BORDER_DEFAULT)?;
    imgproc::sobel(&src, &mut gy, core::CV_32F, 0, 1, APERTURE, 1.0, 0.0, core::BORDER_DEFAULT)?;

    let mut magnitude = Mat::default();
    core::magnitude(&gx, &gy, &mut magnitude)?;
    let mut out = Mat::default();
    magnitude.convert_to(&mut out, core::CV_8U, 1.0, 0.0)?;
    from_mat(&out)
}
