use std::path::PathBuf;
use std::str::FromStr;

use frame_relay::{TransformConfig, UpstreamConfig};
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_STATIC_DIR: &str = "./static";

/// Everything the HTTP server needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Root of the static assets; the morphology page reads `images/` below it.
    pub static_dir: PathBuf,
    pub upstream: UpstreamConfig,
    pub transforms: TransformConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            upstream: UpstreamConfig::default(),
            transforms: TransformConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `RELAY_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Missing keys keep their default;
    /// keys that fail to parse keep their default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(bind) = text("RELAY_BIND") {
            cfg.bind_addr = bind;
        }
        if let Some(url) = text("RELAY_CAMERA_URL") {
            cfg.upstream.base_url = url;
        }
        if let Some(path) = text("RELAY_CAMERA_PATH") {
            cfg.upstream.stream_path = path;
        }
        if let Some(dir) = text("RELAY_STATIC_DIR") {
            cfg.static_dir = PathBuf::from(dir);
        }
        cfg.upstream.port = parsed("RELAY_CAMERA_PORT", text("RELAY_CAMERA_PORT"), cfg.upstream.port);
        cfg.transforms.clahe_clip_limit = parsed("RELAY_CLAHE_CLIP", text("RELAY_CLAHE_CLIP"), cfg.transforms.clahe_clip_limit);

        let quality = parsed("RELAY_JPEG_QUALITY", text("RELAY_JPEG_QUALITY"), cfg.transforms.jpeg_quality);
        cfg.transforms.jpeg_quality = quality.clamp(1, 100);
        cfg
    }
}

fn parsed<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(value) = value else {
        return default;
    };
    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(%key, %value, %default, "ignoring unparsable setting");
            default
        }
    }
}
