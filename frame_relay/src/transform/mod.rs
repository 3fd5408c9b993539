// THEORY:
// The transform registry is the fixed catalogue of pipelines a viewer can pick
// from. Each entry is a `TransformSpec` that says, as data, everything the
// pipeline runner needs to know:
// 1.  **Arity**: whether the function wants only the current frame or the
//     previous frame as well. The runner dispatches on this tag; it never
//     inspects which function it was handed.
// 2.  **Layout**: how the output panels are arranged, so callers can predict
//     output dimensions without running the transform.
// 3.  **Purity**: every function takes shared references and returns a freshly
//     allocated `Frame`, or the OpenCV error that stopped it. Nothing a transform does can reach the frame the runner
//     keeps for the next iteration.
//
// The registry is built once at startup from a `TransformConfig` and then
// shared read-only (`Arc<Registry>`) by every viewer.

pub mod catalog;
pub mod filters;

use std::fmt;
use std::sync::Arc;

use image::RgbImage;

use crate::config::TransformConfig;
use crate::error::{RelayError, Result};
use crate::frame::Frame;

pub type OneFrameFn = dyn Fn(&RgbImage) -> Result<Frame> + Send + Sync;
pub type TwoFrameFn = dyn Fn(&RgbImage, &RgbImage) -> Result<Frame> + Send + Sync;

/// How many input frames a transform consumes, carrying the function itself.
#[derive(Clone)]
pub enum Arity {
    One(Arc<OneFrameFn>),
    /// `f(previous, current)`.
    Two(Arc<TwoFrameFn>),
}

impl Arity {
    pub fn frames(&self) -> usize {
        match self {
            Arity::One(_) => 1,
            Arity::Two(_) => 2,
        }
    }
}

impl fmt::Debug for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::One(_) => f.write_str("One"),
            Arity::Two(_) => f.write_str("Two"),
        }
    }
}

/// Arrangement of the output panels relative to one input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Single,
    /// Input on the left, processed result on the right.
    SideBySide,
    Grid { rows: u32, cols: u32 },
}

impl Layout {
    /// Output size for an input of `width` x `height`.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            Layout::Single => (width, height),
            Layout::SideBySide => (width * 2, height),
            Layout::Grid { rows, cols } => (width * cols, height * rows),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub name: &'static str,
    /// HTTP path the server exposes this transform under.
    pub route: &'static str,
    pub arity: Arity,
    pub layout: Layout,
}

impl TransformSpec {
    pub fn one(name: &'static str, route: &'static str, layout: Layout, f: impl Fn(&RgbImage) -> Result<Frame> + Send + Sync + 'static) -> Self {
        Self {
            name,
            route,
            arity: Arity::One(Arc::new(f)),
            layout,
        }
    }

    pub fn two(name: &'static str, route: &'static str, layout: Layout, f: impl Fn(&RgbImage, &RgbImage) -> Result<Frame> + Send + Sync + 'static) -> Self {
        Self {
            name,
            route,
            arity: Arity::Two(Arc::new(f)),
            layout,
        }
    }

    /// Runs the transform. Two-frame transforms return `Ok(None)` until a
    /// previous frame exists.
    pub fn apply(&self, previous: Option<&RgbImage>, current: &RgbImage) -> Result<Option<Frame>> {
        match (&self.arity, previous) {
            (Arity::One(f), _) => f(current).map(Some),
            (Arity::Two(f), Some(prev)) => f(prev, current).map(Some),
            (Arity::Two(_), None) => Ok(None),
        }
    }
}

/// The fixed, read-only catalogue of named transforms.
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<TransformSpec>,
}

impl Registry {
    /// The standard catalogue, in the order the index page lists it.
    pub fn standard(config: &TransformConfig) -> Self {
        let clip = config.clahe_clip_limit;
        let specs = vec![
            TransformSpec::one("passthrough", "/video_stream", Layout::Single, catalog::passthrough),
            TransformSpec::one("gray-noise", "/video_stream_gray_noise", Layout::SideBySide, catalog::gray_with_salt_noise),
            TransformSpec::one("hist-eq", "/video_stream_hist_eq", Layout::SideBySide, catalog::histogram_equalization),
            TransformSpec::one("clahe", "/video_stream_clahe", Layout::SideBySide, move |img| catalog::clahe(img, clip)),
            TransformSpec::one("log", "/video_stream_log", Layout::SideBySide, catalog::logarithmic_luminance),
            TransformSpec::one("smoothing", "/video_stream_smoothing", Layout::Grid { rows: 3, cols: 3 }, catalog::smoothing_bank),
            TransformSpec::two("motion", "/video_stream_motion", Layout::Single, catalog::motion_diff),
            TransformSpec::one("edges", "/video_stream_edges", Layout::Grid { rows: 2, cols: 3 }, catalog::edge_detection),
        ];
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Result<&TransformSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| RelayError::UnknownTransform(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard(&TransformConfig::default())
    }
}
