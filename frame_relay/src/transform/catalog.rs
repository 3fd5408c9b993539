//! The named transforms behind each stream route.
//!
//! Every function here borrows its inputs and returns a new `Frame`; none of
//! them mutates the camera frame it was given. An `Err` means OpenCV rejected
//! the frame, and the runner drops that one frame.

use image::{GrayImage, Luma, RgbImage};
use opencv::core::{self, Mat};
use opencv::imgproc;
use opencv::prelude::*;

use super::filters::mat::{from_mat, to_mat};
use super::filters::{color, compose, edges, histogram, smoothing, text};
use crate::error::Result;
use crate::frame::Frame;

pub const SALT_PIXELS: usize = 537;
pub const MOTION_THRESHOLD: u8 = 30;
pub const MOTION_MIN_PIXELS: usize = 100;
pub const MOTION_LABEL: &str = "MOTION DETECTED!";
pub const MOTION_LABEL_ORIGIN: (i64, i64) = (50, 50);
pub const SMOOTHING_KERNELS: [u32; 3] = [3, 5, 7];
const EDGE_BLUR_KERNEL: u32 = 5;

pub fn passthrough(img: &RgbImage) -> Result<Frame> {
    Ok(Frame::Color(img.clone()))
}

pub fn gray_with_salt_noise(img: &RgbImage) -> Result<Frame> {
    let gray = color::to_gray(img)?;
    let mut noisy = gray.clone();
    let (w, h) = noisy.dimensions();
    if w > 0 && h > 0 {
        for _ in 0..SALT_PIXELS {
            noisy.put_pixel(fastrand::u32(..w), fastrand::u32(..h), Luma([u8::MAX]));
        }
    }
    Ok(Frame::Gray(compose::hstack(&[&gray, &noisy])))
}

pub fn histogram_equalization(img: &RgbImage) -> Result<Frame> {
    let equalized = color::map_lightness(img, histogram::equalize)?;
    Ok(Frame::Color(compose::hstack(&[img, &equalized])))
}

pub fn clahe(img: &RgbImage, clip_limit: f64) -> Result<Frame> {
    let result = color::map_lightness(img, |l| histogram::clahe(l, clip_limit))?;
    Ok(Frame::Color(compose::hstack(&[img, &result])))
}

pub fn logarithmic_luminance(img: &RgbImage) -> Result<Frame> {
    let result = color::map_lightness(img, histogram::log_stretch)?;
    Ok(Frame::Color(compose::hstack(&[img, &result])))
}

/// Median, box and Gaussian blur at each kernel size; one row per size.
pub fn smoothing_bank(img: &RgbImage) -> Result<Frame> {
    let label_origin = (10, img.height() as i64 - 10);
    let label = |mut panel: RgbImage, name: &str, k: u32| {
        text::draw_text(&mut panel, label_origin, &format!("{name} {k}x{k}"), image::Rgb([255, 255, 255]), 2);
        panel
    };

    let mut rows = Vec::with_capacity(SMOOTHING_KERNELS.len());
    for k in SMOOTHING_KERNELS {
        let median = label(smoothing::median_blur(img, k)?, "Median", k);
        let boxed = label(smoothing::box_blur(img, k)?, "Box", k);
        let gaussian = label(smoothing::gaussian_blur(img, k)?, "Gaussian", k);
        rows.push(compose::hstack(&[&median, &boxed, &gaussian]));
    }
    let refs: Vec<&RgbImage> = rows.iter().collect();
    Ok(Frame::Color(compose::vstack(&refs)))
}

/// Binary mask of pixels whose gray level moved by more than
/// `MOTION_THRESHOLD`, with the number of moving pixels. Frames of different
/// sizes are an error.
pub fn motion_mask(previous: &RgbImage, current: &RgbImage) -> Result<(GrayImage, usize)> {
    let prev = to_mat(&color::to_gray(previous)?)?;
    let cur = to_mat(&color::to_gray(current)?)?;
    if cur.empty() {
        return Ok((GrayImage::new(0, 0), 0));
    }

    let mut diff = Mat::default();
    core::absdiff(&prev, &cur, &mut diff)?;
    let mut mask = Mat::default();
    imgproc::threshold(&diff, &mut mask, f64::from(MOTION_THRESHOLD), 255.0, imgproc::THRESH_BINARY)?;
    let moving = core::count_non_zero(&mask)? as usize;
    Ok((from_mat(&mask)?, moving))
}

pub fn motion_diff(previous: &RgbImage, current: &RgbImage) -> Result<Frame> {
    let (mut mask, moving) = motion_mask(previous, current)?;
    if moving > MOTION_MIN_PIXELS {
        text::draw_text(&mut mask, MOTION_LABEL_ORIGIN, MOTION_LABEL, Luma([u8::MAX]), 3);
    }
    Ok(Frame::Gray(mask))
}

/// Canny and Sobel on the raw gray image (top row) and on a blurred copy (bottom row).
pub fn edge_detection(img: &RgbImage) -> Result<Frame> {
    let gray = color::to_gray(img)?;
    let blurred = smoothing::gaussian_blur(&gray, EDGE_BLUR_KERNEL)?;

    let row = |src: &GrayImage| -> Result<[GrayImage; 3]> {
        Ok([
            src.clone(),
            edges::canny(src, edges::CANNY_LOW, edges::CANNY_HIGH)?,
            edges::sobel_magnitude(src)?,
        ])
    };
    let [a, b, c] = row(&gray)?;
    let [d, e, f] = row(&blurred)?;
    Ok(Frame::Gray(compose::grid(&[&a, &b, &c, &d, &e, &f], 3)))
}
