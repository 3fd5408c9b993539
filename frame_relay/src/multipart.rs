// THEORY:
// `multipart/x-mixed-replace` is the oldest trick for live video in a browser:
// the server never finishes the response and instead keeps appending parts,
// each introduced by the boundary line. The client renders the newest part in
// place of the previous one, so `<img src="/video_stream">` just works.
//
// An `EncodedFrame` is one JPEG plus the framing bytes around it. It is built
// once per processed frame and handed straight to the viewer's body stream.

use bytes::{BufMut, Bytes, BytesMut};

pub const BOUNDARY: &str = "frame";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";
pub const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
pub const PART_TRAILER: &[u8] = b"\r\n";

/// One compressed output frame, ready to be written to a viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    pub jpeg: Bytes,
    pub width: u32,
    pub height: u32,
    /// FPS value that was burned into this frame.
    pub fps: f64,
}

impl EncodedFrame {
    /// The exact bytes of this frame's multipart part.
    pub fn to_part(&self) -> Bytes {
        let mut part = BytesMut::with_capacity(PART_HEADER.len() + self.jpeg.len() + PART_TRAILER.len());
        part.put_slice(PART_HEADER);
        part.put_slice(&self.jpeg);
        part.put_slice(PART_TRAILER);
        part.freeze()
    }
}
