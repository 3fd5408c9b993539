use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const DEFAULT_MIN_CHUNK_LEN: usize = 100;
pub const DEFAULT_CLAHE_CLIP_LIMIT: f64 = 40.0;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Where the camera lives and how its byte stream is cut into chunks.
///
/// Built once at startup and handed to every decoder by reference; nothing
/// mutates it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    /// Scheme and host, e.g. `http://192.168.1.13`.
    pub base_url: String,
    pub port: u16,
    /// Streaming route on the camera, e.g. `/stream`.
    pub stream_path: String,
    /// Largest slice handed to the image decoder in one go.
    pub chunk_size: usize,
    /// Slices at or below this length are treated as keep-alives and dropped.
    pub min_chunk_len: usize,
    pub connect_timeout: Duration,
}

/// The two numbers the chunk decoder needs, detached from the config so the
/// decoded stream does not borrow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub chunk_size: usize,
    pub min_chunk_len: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
        }
    }
}

impl UpstreamConfig {
    pub fn limits(&self) -> ChunkLimits {
        ChunkLimits {
            chunk_size: self.chunk_size.max(1),
            min_chunk_len: self.min_chunk_len,
        }
    }

    pub fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.stream_path.trim_start_matches('/');
        format!("{base}:{}/{path}", self.port)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://192.168.1.13".to_string(),
            port: 81,
            stream_path: "/stream".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Tunables shared by every transform in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub clahe_clip_limit: f64,
    pub jpeg_quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: DEFAULT_CLAHE_CLIP_LIMIT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}
