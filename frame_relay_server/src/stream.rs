// THEORY:
// The stream multiplexer gives every viewer a private pipeline. A request for a
// stream route opens its own upstream connection, builds a fresh
// `PipelineRunner` and returns a response whose body is that runner's output,
// framed as multipart parts. Viewers share nothing but the read-only registry
// and the HTTP client's connection settings.
//
// Lifetimes follow the body stream. When a viewer disconnects, hyper drops the
// body, which drops the runner, the decoder and the reqwest response, closing
// the camera socket. A `ViewerSession` rides along inside the stream and logs
// when it is dropped, so session close is visible however it happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use frame_relay::multipart::CONTENT_TYPE;
use frame_relay::{PipelineRunner, decoder, pipeline};
use futures_util::StreamExt;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Log bookkeeping for one viewer connection.
#[derive(Debug)]
pub struct ViewerSession {
    id: u64,
    transform: &'static str,
    opened: Instant,
    frames: u64,
}

impl ViewerSession {
    pub fn open(transform: &'static str) -> Self {
        let id = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        info!(session = id, transform, "viewer connected");
        Self {
            id,
            transform,
            opened: Instant::now(),
            frames: 0,
        }
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        info!(
            session = self.id,
            transform = self.transform,
            frames = self.frames,
            secs = self.opened.elapsed().as_secs_f64(),
            "viewer disconnected"
        );
    }
}

/// `GET /stream/:name`
pub async fn by_name(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response, ApiError> {
    open(state, &name).await
}

/// Opens the upstream connection and returns the streaming response for the
/// transform called `name`.
pub async fn open(state: AppState, name: &str) -> Result<Response, ApiError> {
    let spec = state.registry.get(name)?.clone();
    let chunks = decoder::connect(&state.client, &state.config.upstream).await?;

    let frames = decoder::decode_frames(chunks, state.config.upstream.limits());
    let mut session = ViewerSession::open(spec.name);
    let runner = PipelineRunner::new(spec, state.config.transforms.jpeg_quality);
    let parts = pipeline::run(frames, runner).map(move |encoded| {
        encoded.map(|frame| {
            session.record_frame();
            frame.to_part()
        })
    });

    let headers = [
        (header::CONTENT_TYPE, CONTENT_TYPE),
        (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ];
    Ok((headers, Body::from_stream(parts)).into_response())
}
