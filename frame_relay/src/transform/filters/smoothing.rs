//! Neighbourhood blurs over 8-bit gray or RGB buffers.
//!
//! Kernel sizes must be odd. Gaussian sigma is left at 0 so OpenCV derives it
//! from the kernel size. Borders use OpenCV's default reflection.

use image::Pixel;
use opencv::core::{self, Mat, Point, Size};
use opencv::imgproc;
use opencv::prelude::*;

use super::mat::{Buffer, from_mat, to_mat};
use crate::error::Result;

fn filtered<P>(img: &Buffer<P>, f: impl FnOnce(&Mat, &mut Mat) -> opencv::Result<()>) -> Result<Buffer<P>>
where
    P: Pixel<Subpixel = u8>,
{
    let src = to_mat(img)?;
    if src.empty() {
        return Ok(img.clone());
    }
    let mut out = Mat::default();
    f(&src, &mut out)?;
    from_mat(&out)
}

pub fn median_blur<P>(img: &Buffer<P>, k: u32) -> Result<Buffer<P>>
where
    P: Pixel<Subpixel = u8>,
{
    filtered(img, |src, out| imgproc::median_blur(src, out, k as i32))
}

pub fn box_blur<P>(img: &Buffer<P>, k: u32) -> Result<Buffer<P>>
where
    P: Pixel<Subpixel = u8>,
{
    let size = Size::new(k as i32, k as i32);
    filtered(img, |src, out| imgproc::blur(src, out, size, Point::new(-1, -1), core::BORDER_DEFAULT))
}

pub fn gaussian_blur<P>(img: &Buffer<P>, k: u32) -> Result<Buffer<P>>
where
    P: Pixel<Subpixel = u8>,
{
    let size = Size::new(k as i32, k as i32);
    filtered(img, |src, out| imgproc::gaussian_blur(src, out, size, 0.0, 0.0, core::BORDER_DEFAULT))
}
