// THEORY:
// `frame_relay_server` is the HTTP face of the relay. It owns no image logic:
// every route either streams the output of a `frame_relay` pipeline or renders
// a small HTML page around it.
//
// Routes:
// - `/` lists every stream as an `<img>` so a browser shows them all at once.
// - `/healthz` answers `ok`.
// - one fixed route per registry entry (`/video_stream`, `/video_stream_clahe`, ...)
//   plus `/stream/:name` for selecting a transform by name.
// - `/morph_operations` renders the morphology panels for the sample images.
//
// `AppState` is cloned into every handler. Its fields are either `Arc`s or
// cheap handles, and none of them is mutated after startup.

pub mod config;
pub mod error;
pub mod morph;
pub mod stream;

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use frame_relay::{Registry, decoder};
use tokio::net::TcpListener;
use tracing::info;

pub use config::ServerConfig;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<Registry>,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(config: ServerConfig) -> frame_relay::Result<Self> {
        let client = decoder::client(&config.upstream)?;
        let registry = Registry::standard(&config.transforms);
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            client,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/healthz", get(|| async { "ok" }))
        .route("/stream/:name", get(stream::by_name))
        .route("/morph_operations", get(morph::morph_operations));

    for spec in state.registry.iter() {
        let name = spec.name;
        app = app.route(
            spec.route,
            get(move |State(state): State<AppState>| stream::open(state, name)),
        );
    }

    app.with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let mut page = String::from("<!doctype html>\n<html><head><title>Camera relay</title></head><body>\n<h1>Camera relay</h1>\n");
    for spec in state.registry.iter() {
        let _ = writeln!(page, "<h2>{}</h2>\n<img src=\"{}\" alt=\"{}\">", spec.name, spec.route, spec.name);
    }
    page.push_str("<p><a href=\"/morph_operations\">Morphological operations</a></p>\n</body></html>\n");
    Html(page)
}

/// Binds `config.bind_addr` and serves until the process is stopped.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(config).context("failed to build camera client")?;
    let bind_addr = state.config.bind_addr.clone();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(
        addr = %bind_addr,
        camera = %state.config.upstream.stream_url(),
        transforms = state.registry.len(),
        "relay listening"
    );
    axum::serve(listener, router(state)).await.context("server stopped")?;
    Ok(())
}
