//! Pixel-level building blocks the named transforms are assembled from. The
//! image processing itself is OpenCV's; `mat` moves buffers in and out of it.

pub mod color;
pub mod compose;
pub mod edges;
pub mod histogram;
pub mod mat;
pub mod morphology;
pub mod smoothing;
pub mod text;
