// THEORY:
// A `Frame` is the unit every transform produces. Camera input always arrives
// as a colour raster, but several transforms (noise, motion mask, edges) hand
// back a single-channel image, so the output side is an enum over the two
// buffer types rather than a colour image with three identical channels.
//
// Frames are ephemeral. They live for one pipeline iteration and are never
// shared mutably: a transform takes `&RgbImage` and returns a new `Frame`.

use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma, Rgb, RgbImage};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;

use crate::error::{RelayError, Result};
use crate::transform::filters::text;

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Color(RgbImage),
    Gray(GrayImage),
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Frame::Color(img) => img.width(),
            Frame::Gray(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Color(img) => img.height(),
            Frame::Gray(img) => img.height(),
        }
    }

    pub fn is_gray(&self) -> bool {
        matches!(self, Frame::Gray(_))
    }

    /// Burns `text` into the frame with its baseline-left corner at `origin`.
    /// Gray frames receive the luminance of `color`.
    pub fn draw_text(&mut self, origin: (i64, i64), text: &str, color: [u8; 3], scale: u32) {
        match self {
            Frame::Color(img) => text::draw_text(img, origin, text, Rgb(color), scale),
            Frame::Gray(img) => text::draw_text(img, origin, text, Luma([luma(color)]), scale),
        }
    }

    /// Baseline JPEG at the given quality.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality);
        let (bytes, color) = self.raw();
        encoder
            .write_image(bytes, self.width(), self.height(), color)
            .map_err(RelayError::Encode)?;
        Ok(out)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = PngEncoder::new(&mut out);
        let (bytes, color) = self.raw();
        encoder
            .write_image(bytes, self.width(), self.height(), color)
            .map_err(RelayError::Encode)?;
        Ok(out)
    }

    fn raw(&self) -> (&[u8], ExtendedColorType) {
        match self {
            Frame::Color(img) => (img.as_raw(), ExtendedColorType::Rgb8),
            Frame::Gray(img) => (img.as_raw(), ExtendedColorType::L8),
        }
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        Frame::Color(img)
    }
}

impl From<GrayImage> for Frame {
    fn from(img: GrayImage) -> Self {
        Frame::Gray(img)
    }
}

/// Decodes one self-contained compressed image into a colour raster.
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(RelayError::Decode)?;
    Ok(img.to_rgb8())
}

/// Rec. 601 luma, the same weights the camera-side gray conversion uses.
pub fn luma(rgb: [u8; 3]) -> u8 {
    let [r, g, b] = rgb;
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}
