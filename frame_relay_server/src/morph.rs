//! `GET /morph_operations`: a one-shot page of morphology panels computed from
//! the sample images under `{static_dir}/images/`.

use std::fmt::Write as _;
use std::path::Path;

use axum::extract::{Query, State};
use axum::response::Html;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use frame_relay::transform::filters::morphology::{KernelSize, MorphologyPanels};
use frame_relay::{Frame, RelayError};
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

pub const DEFAULT_KERNEL_SIZE: u32 = 7;
pub const SAMPLE_IMAGES: [&str; 3] = ["image1.jpg", "image2.jpg", "image3.jpg"];

#[derive(Debug, Deserialize)]
pub struct MorphQuery {
    #[serde(default = "default_kernel_size")]
    pub kernel_size: u32,
}

fn default_kernel_size() -> u32 {
    DEFAULT_KERNEL_SIZE
}

pub async fn morph_operations(State(state): State<AppState>, Query(query): Query<MorphQuery>) -> Result<Html<String>, ApiError> {
    // reject bad sizes before touching the disk
    let kernel = KernelSize::new(query.kernel_size)?;
    let static_dir = state.config.static_dir.clone();
    let page = tokio::task::spawn_blocking(move || render(&static_dir, kernel))
        .await
        .map_err(RelayError::Worker)??;
    Ok(Html(page))
}

/// Loads every sample image and renders the panel table. Blocking; the handler
/// runs it on the blocking pool.
pub fn render(static_dir: &Path, kernel: KernelSize) -> Result<String, RelayError> {
    let mut html = String::from("<h1>Morphological Operations</h1>\n<table>\n");
    for (index, file) in SAMPLE_IMAGES.iter().enumerate() {
        let path = static_dir.join("images").join(file);
        let img = image::open(&path)
            .map_err(|source| RelayError::StaticImage {
                path: path.clone(),
                source,
            })?
            .to_luma8();
        debug!(path = %path.display(), k = kernel.get(), "computing morphology panels");

        let panels = MorphologyPanels::compute(&img, kernel)?;
        let labelled = panels.labelled();

        let _ = writeln!(html, "<tr><th colspan='{}'>image_{}</th></tr>", labelled.len(), index + 1);
        html.push_str("<tr>");
        for (label, _) in &labelled {
            let _ = write!(html, "<th>{label}</th>");
        }
        html.push_str("</tr>\n<tr>");
        for (label, panel) in labelled {
            let png = Frame::Gray(panel.clone()).encode_png()?;
            let _ = write!(
                html,
                "<td><img src=\"data:image/png;base64,{}\" alt=\"{label}\" style=\"width: 100%\"></td>",
                STANDARD.encode(png)
            );
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    Ok(html)
}
