//! Colour-space helpers: gray conversion and edits confined to the Lab
//! lightness plane.

use image::{GrayImage, RgbImage};
use opencv::core::{self, Mat, Vector};
use opencv::imgproc;
use opencv::prelude::*;

use super::mat::{from_mat, to_mat};
use crate::error::Result;

pub fn to_gray(img: &RgbImage) -> Result<GrayImage> {
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(GrayImage::new(0, 0));
    }
    let mut gray = Mat::default();
    imgproc::cvt_color(&src, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;
    from_mat(&gray)
}

/// Converts to Lab, replaces the L plane with `op(L)` and converts back. The
/// chroma planes pass through untouched.
pub fn map_lightness(img: &RgbImage, op: impl FnOnce(&GrayImage) -> Result<GrayImage>) -> Result<RgbImage> {
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(img.clone());
    }

    let mut lab = Mat::default();
    imgproc::cvt_color(&src, &mut lab, imgproc::COLOR_RGB2Lab, 0)?;
    let mut planes = Vector::<Mat>::new();
    core::split(&lab, &mut planes)?;

    let lightness: GrayImage = from_mat(&planes.get(0)?)?;
    planes.set(0, to_mat(&op(&lightness)?)?)?;

    let mut merged = Mat::default();
    core::merge(&planes, &mut merged)?;
    let mut out = Mat::default();
    imgproc::cvt_color(&merged, &mut out, imgproc::COLOR_Lab2RGB, 0)?;
    from_mat(&out)
}
