// THEORY:
// The chunk decoder is the bridge between the camera's socket and the frame
// pipeline. The camera pushes an endless chunked body; by the camera's own
// chunking behaviour each read carries exactly one JPEG, so the decoder treats
// every retained slice as a complete image and never stitches slices together.
//
// Key principles:
// 1.  **Lazy and unbounded**: frames are produced as chunks arrive; nothing is
//     read ahead of what the consumer pulls.
// 2.  **Per-chunk failures are noise**: keep-alive fragments and undecodable
//     slices are dropped with a log line and the stream carries on.
// 3.  **Transport failures are final**: a broken upstream is yielded once as an
//     error and the stream ends. There is no reconnect here; the viewer that
//     owns this decoder reconnects if it wants to.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use image::RgbImage;
use tracing::{debug, trace, warn};

use crate::config::{ChunkLimits, UpstreamConfig};
use crate::error::{RelayError, Result};
use crate::frame;

/// The raw upstream body, one network read per item.
pub type ChunkStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Builds the HTTP client used for camera connections.
pub fn client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|source| RelayError::UpstreamConnect {
            url: config.stream_url(),
            source,
        })
}

/// Opens a fresh streaming connection to the camera.
pub async fn connect(client: &reqwest::Client, config: &UpstreamConfig) -> Result<ChunkStream> {
    let url = config.stream_url();
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| RelayError::UpstreamConnect {
            url: url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::UpstreamStatus { url, status });
    }

    debug!(%url, "connected to camera stream");
    Ok(Box::pin(response.bytes_stream()))
}

/// Turns a stream of raw chunks into a stream of decoded colour frames.
pub fn decode_frames<S, E>(chunks: S, limits: ChunkLimits) -> impl Stream<Item = Result<RgbImage>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<RelayError>,
{
    async_stream::stream! {
        futures::pin_mut!(chunks);
        while let Some(read) = chunks.next().await {
            let buffer = match read {
                Ok(buffer) => buffer,
                Err(err) => {
                    let err: RelayError = err.into();
                    warn!(error = %err, "camera stream ended");
                    yield Err(err);
                    return;
                }
            };

            for chunk in split(buffer, limits.chunk_size) {
                if chunk.len() <= limits.min_chunk_len {
                    trace!(len = chunk.len(), "dropping undersized chunk");
                    continue;
                }
                match frame::decode(&chunk) {
                    Ok(img) => yield Ok(img),
                    Err(err) => debug!(len = chunk.len(), error = %err, "dropping undecodable chunk"),
                }
            }
        }
    }
}

/// Re-slices one network read into pieces no longer than `max` bytes.
fn split(buffer: Bytes, max: usize) -> impl Iterator<Item = Bytes> {
    let max = max.max(1);
    let len = buffer.len();
    (0..len)
        .step_by(max)
        .map(move |start| buffer.slice(start..(start + max).min(len)))
}
