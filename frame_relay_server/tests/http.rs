use std::net::SocketAddr;
use std::time::Duration;

use frame_relay::multipart::PART_HEADER;
use frame_relay::{Frame, UpstreamConfig};
use frame_relay_server::{AppState, ServerConfig, router};
use image::{Rgb, RgbImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

async fn spawn_relay(config: ServerConfig) -> SocketAddr {
    let state = AppState::new(config).expect("state");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = listener.local_addr().expect("relay addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("relay runs");
    });
    addr
}

/// A port nothing is listening on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("addr").port()
}

fn camera_config(port: u16) -> ServerConfig {
    ServerConfig {
        upstream: UpstreamConfig {
            base_url: "http://127.0.0.1".to_string(),
            port,
            connect_timeout: Duration::from_secs(2),
            ..UpstreamConfig::default()
        },
        ..ServerConfig::default()
    }
}

fn test_jpeg() -> Vec<u8> {
    let img = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 90]));
    Frame::Color(img).encode_jpeg(90).expect("encode fixture")
}

/// Serves one connection, writing `frames` JPEGs as separate reads with a
/// pause in between, then closes.
async fn spawn_camera(frames: usize) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind camera");
    let port = listener.local_addr().expect("camera addr").port();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let jpeg = test_jpeg();
        for _ in 0..frames {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket.write_all(&jpeg).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    });
    port
}

/// Streams JPEGs until a write fails, then reports the failure on the
/// returned channel.
async fn spawn_endless_camera() -> (u16, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind camera");
    let port = listener.local_addr().expect("camera addr").port();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n";
        let jpeg = test_jpeg();
        let mut sent = socket.write_all(head.as_bytes()).await;
        while sent.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
            sent = socket.write_all(&jpeg).await;
        }
        let _ = closed_tx.send(());
    });
    (port, closed_rx)
}

/// Sends one JPEG as a chunked body, then drops the connection without the
/// terminating chunk.
async fn spawn_resetting_camera() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind camera");
    let port = listener.local_addr().expect("camera addr").port();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let jpeg = test_jpeg();
        let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        response.extend_from_slice(format!("{:x}\r\n", jpeg.len()).as_bytes());
        response.extend_from_slice(&jpeg);
        response.extend_from_slice(b"\r\n");
        if socket.write_all(&response).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        drop(socket);
    });
    port
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

#[tokio::test]
async fn health_check_answers_ok() {
    let addr = spawn_relay(ServerConfig::default()).await;
    let res = reqwest::get(url(addr, "/healthz")).await.expect("request");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.expect("body"), "ok");
}

#[tokio::test]
async fn index_links_every_stream() {
    let addr = spawn_relay(ServerConfig::default()).await;
    let page = reqwest::get(url(addr, "/")).await.expect("request").text().await.expect("body");
    for route in ["/video_stream", "/video_stream_clahe", "/video_stream_motion", "/video_stream_edges"] {
        assert!(page.contains(&format!("src=\"{route}\"")), "missing {route}");
    }
}

#[tokio::test]
async fn unknown_transform_is_not_found() {
    let addr = spawn_relay(ServerConfig::default()).await;
    let res = reqwest::get(url(addr, "/stream/sepia")).await.expect("request");
    assert_eq!(res.status(), 404);
    assert!(res.text().await.expect("body").contains("sepia"));
}

#[tokio::test]
async fn unsupported_kernel_is_rejected_before_loading_images() {
    let mut config = ServerConfig::default();
    config.static_dir = "/nonexistent/static".into();
    let addr = spawn_relay(config).await;

    let res = reqwest::get(url(addr, "/morph_operations?kernel_size=11")).await.expect("request");
    assert_eq!(res.status(), 400);

    let res = reqwest::get(url(addr, "/morph_operations?kernel_size=3")).await.expect("request");
    assert_eq!(res.status(), 500);
    assert!(res.text().await.expect("body").contains("image1.jpg"));
}

#[tokio::test]
async fn unreachable_camera_is_a_bad_gateway() {
    let addr = spawn_relay(camera_config(closed_port().await)).await;
    let res = reqwest::get(url(addr, "/video_stream")).await.expect("request");
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn camera_frames_arrive_as_multipart_parts() {
    let camera = spawn_camera(2).await;
    let addr = spawn_relay(camera_config(camera)).await;

    let mut res = reqwest::get(url(addr, "/video_stream")).await.expect("request");
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["content-type"],
        "multipart/x-mixed-replace; boundary=frame"
    );
    assert_eq!(res.headers()["cache-control"], "no-cache, no-store, must-revalidate");

    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await.expect("body chunk") {
        body.extend_from_slice(&chunk);
    }
    assert!(body.starts_with(PART_HEADER));

    let first = &body[PART_HEADER.len()..];
    let end = first
        .windows(PART_HEADER.len())
        .position(|w| w == PART_HEADER)
        .map(|i| i - 2)
        .unwrap_or(first.len() - 2);
    let decoded = image::load_from_memory(&first[..end]).expect("part is a JPEG");
    assert_eq!((decoded.width(), decoded.height()), (64, 48));
}

#[tokio::test]
async fn side_by_side_streams_double_the_width() {
    let camera = spawn_camera(1).await;
    let addr = spawn_relay(camera_config(camera)).await;

    let body = reqwest::get(url(addr, "/stream/gray-noise"))
        .await
        .expect("request")
        .bytes()
        .await
        .expect("body");
    assert!(body.starts_with(PART_HEADER));
    let jpeg = &body[PART_HEADER.len()..body.len() - 2];
    let decoded = image::load_from_memory(jpeg).expect("part is a JPEG");
    assert_eq!((decoded.width(), decoded.height()), (128, 48));
}

#[tokio::test]
async fn viewer_disconnect_closes_the_camera_connection() {
    let (camera, closed) = spawn_endless_camera().await;
    let addr = spawn_relay(camera_config(camera)).await;

    let mut res = reqwest::get(url(addr, "/video_stream")).await.expect("request");
    assert_eq!(res.status(), 200);
    let first = res.chunk().await.expect("body chunk").expect("a part arrives");
    assert!(first.starts_with(PART_HEADER));
    drop(res);

    tokio::time::timeout(Duration::from_secs(5), closed)
        .await
        .expect("camera socket closed after the viewer left")
        .expect("camera task reported");
}

#[tokio::test]
async fn camera_reset_mid_stream_aborts_the_response() {
    let camera = spawn_resetting_camera().await;
    let addr = spawn_relay(camera_config(camera)).await;

    let mut res = reqwest::get(url(addr, "/video_stream")).await.expect("request");
    assert_eq!(res.status(), 200);

    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        let mut body = Vec::new();
        loop {
            match res.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => return (body, false),
                Err(_) => return (body, true),
            }
        }
    })
    .await
    .expect("response ends after the camera resets");

    let (body, aborted) = outcome;
    assert!(body.starts_with(PART_HEADER), "the frame before the reset is relayed");
    assert!(aborted, "a clean end of body would hide the camera failure");
}
