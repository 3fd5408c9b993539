// THEORY:
// Gray-scale morphology with a square, all-ones structuring element. Erosion
// and dilation are min and max filters; opening, closing and the hat
// transforms are compositions of those two, all run through
// `imgproc::morphology_ex`. Pixels outside the image never win the min or max.
//
// Only the batch panel endpoint uses this module; it never runs per frame.

use image::GrayImage;
use opencv::core::{self, Mat, Point, Size};
use opencv::imgproc;
use opencv::prelude::*;

use super::mat::{from_mat, to_mat};
use crate::error::{RelayError, Result};

pub const SUPPORTED_KERNELS: [u32; 3] = [3, 5, 7];

/// A validated odd kernel size from `SUPPORTED_KERNELS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSize(u32);

impl KernelSize {
    pub fn new(size: u32) -> Result<Self> {
        if SUPPORTED_KERNELS.contains(&size) {
            Ok(Self(size))
        } else {
            Err(RelayError::UnsupportedKernel(size))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

fn kernel(k: KernelSize) -> Result<Mat> {
    let size = k.get() as i32;
    Ok(imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(size, size), anchor())?)
}

fn anchor() -> Point {
    Point::new(-1, -1)
}

fn morph(img: &GrayImage, k: KernelSize, op: i32) -> Result<GrayImage> {
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(img.clone());
    }
    let kernel = kernel(k)?;
    let border = imgproc::morphology_default_border_value()?;
    let mut out = Mat::default();
    imgproc::morphology_ex(&src, &mut out, op, &kernel, anchor(), 1, core::BORDER_CONSTANT, border)?;
    from_mat(&out)
}

pub fn erode(img: &GrayImage, k: KernelSize) -> Result<GrayImage> {
    morph(img, k, imgproc::MORPH_ERODE)
}

pub fn dilate(img: &GrayImage, k: KernelSize) -> Result<GrayImage> {
    morph(img, k, imgproc::MORPH_DILATE)
}

/// `img - open(img)`: bright details smaller than the kernel.
pub fn top_hat(img: &GrayImage, k: KernelSize) -> Result<GrayImage> {
    morph(img, k, imgproc::MORPH_TOPHAT)
}

/// `close(img) - img`: dark details smaller than the kernel.
pub fn black_hat(img: &GrayImage, k: KernelSize) -> Result<GrayImage> {
    morph(img, k, imgproc::MORPH_BLACKHAT)
}

/// `a * wa + b * wb`, saturated to 8 bits.
fn weighted(a: &GrayImage, wa: f64, b: &GrayImage, wb: f64) -> Result<GrayImage> {
    let (a, b) = (to_mat(a)?, to_mat(b)?);
    if a.empty() {
        return Ok(GrayImage::new(0, 0));
    }
    let mut out = Mat::default();
    core::add_weighted(&a, wa, &b, wb, 0.0, &mut out, -1)?;
    from_mat(&out)
}

/// The six panels the batch endpoint shows for one source image.
#[derive(Debug, Clone)]
pub struct MorphologyPanels {
    pub original: GrayImage,
    pub erosion: GrayImage,
    pub dilation: GrayImage,
    pub top_hat: GrayImage,
    pub black_hat: GrayImage,
    /// `img + (top_hat - black_hat)`, saturating.
    pub combined: GrayImage,
}

impl MorphologyPanels {
    pub fn compute(img: &GrayImage, k: KernelSize) -> Result<Self> {
        let top = top_hat(img, k)?;
        let black = black_hat(img, k)?;
        let contrast = weighted(&top, 1.0, &black, -1.0)?;
        Ok(Self {
            original: img.clone(),
            erosion: erode(img, k)?,
            dilation: dilate(img, k)?,
            combined: weighted(img, 1.0, &contrast, 1.0)?,
            top_hat: top,
            black_hat: black,
        })
    }

    /// Panels in display order with their column titles.
    pub fn labelled(&self) -> [(&'static str, &GrayImage); 6] {
        [
            ("Original", &self.original),
            ("Erosion", &self.erosion),
            ("Dilation", &self.dilation),
            ("Top Hat", &self.top_hat),
            ("Black Hat", &self.black_hat),
            ("Combined", &self.combined),
        ]
    }
}
