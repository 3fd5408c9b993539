use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Everything that can go wrong between the camera socket and an encoded part.
///
/// Only the `Upstream*` variants and `Worker` end a viewer's stream. `Decode`,
/// `Filter` and `Encode` are per-frame and are swallowed where they occur; the
/// remaining variants are caller mistakes surfaced as client errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect to camera at {url}: {source}")]
    UpstreamConnect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("camera at {url} answered with status {status}")]
    UpstreamStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("camera stream failed: {0}")]
    UpstreamRead(#[from] reqwest::Error),

    #[error("failed to decode frame: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] image::ImageError),

    #[error("image filter failed: {0}")]
    Filter(#[from] opencv::Error),

    #[error("frame worker did not finish: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("unsupported kernel size {0}, expected one of 3, 5 or 7")]
    UnsupportedKernel(u32),

    #[error("failed to load image {}: {source}", path.display())]
    StaticImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

impl RelayError {
    /// True for failures that terminate the stream they occur in.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::UpstreamConnect { .. }
                | RelayError::UpstreamStatus { .. }
                | RelayError::UpstreamRead(_)
                | RelayError::Worker(_)
        )
    }
}
