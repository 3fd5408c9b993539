// THEORY:
// This file is the main entry point for the `frame_relay` library crate.
// It exposes the frame pipeline that sits between a remote MJPEG camera and any
// number of viewers: the chunk decoder that turns the camera's byte stream into
// frames, the registry of named transforms, the pipeline runner that applies a
// transform and overlays the live FPS readout, and the multipart framing that
// turns each encoded JPEG into one part of a `multipart/x-mixed-replace` body.
//
// The HTTP surface lives in `frame_relay_server`; nothing here knows about
// routes or sockets beyond the upstream camera connection.

pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod multipart;
pub mod pipeline;
pub mod transform;

pub use config::{ChunkLimits, TransformConfig, UpstreamConfig};
pub use error::{RelayError, Result};
pub use frame::Frame;
pub use multipart::EncodedFrame;
pub use pipeline::{FpsMeter, Phase, PipelineRunner};
pub use transform::{Arity, Layout, Registry, TransformSpec};
