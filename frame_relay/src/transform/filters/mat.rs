//! Copies between `image` buffers and OpenCV `Mat`s.
//!
//! Frames live as `RgbImage`/`GrayImage` everywhere else in the crate; only the
//! filter bodies work on `Mat`. Both sides are tightly packed 8-bit rows, so a
//! conversion is a single buffer copy. Colour buffers are RGB, which is why the
//! filters use the `RGB2*` conversion codes rather than OpenCV's usual BGR ones.

use image::{ImageBuffer, Pixel};
use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;

use crate::error::{RelayError, Result};

pub type Buffer<P> = ImageBuffer<P, Vec<u8>>;

fn mat_type(channels: u8) -> Result<i32> {
    match channels {
        1 => Ok(core::CV_8UC1),
        3 => Ok(core::CV_8UC3),
        n => Err(RelayError::Filter(opencv::Error::new(
            core::StsBadArg,
            format!("unsupported channel count {n}"),
        ))),
    }
}

pub fn to_mat<P>(img: &Buffer<P>) -> Result<Mat>
where
    P: Pixel<Subpixel = u8>,
{
    let typ = mat_type(P::CHANNEL_COUNT)?;
    if img.width() == 0 || img.height() == 0 {
        return Ok(Mat::default());
    }
    let mut mat = Mat::new_rows_cols_with_default(img.height() as i32, img.width() as i32, typ, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(img.as_raw());
    Ok(mat)
}

pub fn from_mat<P>(mat: &Mat) -> Result<Buffer<P>>
where
    P: Pixel<Subpixel = u8>,
{
    if mat.empty() {
        return Ok(Buffer::new(0, 0));
    }
    if mat.typ() != mat_type(P::CHANNEL_COUNT)? {
        return Err(RelayError::Filter(opencv::Error::new(
            core::StsUnmatchedFormats,
            format!("expected a {}-channel 8-bit matrix", P::CHANNEL_COUNT),
        )));
    }
    let (width, height) = (mat.cols() as u32, mat.rows() as u32);
    // filter outputs are freshly allocated and always continuous
    let bytes = mat.data_bytes()?.to_vec();
    Buffer::from_raw(width, height, bytes).ok_or_else(|| {
        RelayError::Filter(opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("matrix data does not fill {width}x{height}"),
        ))
    })
}
