// THEORY:
// The `pipeline` module is the per-viewer half of the relay. A `PipelineRunner`
// owns one transform and the small amount of state that transform needs across
// frames, and turns each decoded camera frame into at most one encoded output
// frame.
//
// The runner moves through three phases:
// 1.  **AwaitingFirstFrame**: nothing seen yet. The first frame starts the FPS
//     clock. One-frame transforms emit it straight away with an FPS of 0.00;
//     two-frame transforms have nothing to compare against and emit nothing.
// 2.  **Streaming**: every frame updates the FPS estimate from the time since
//     the previous one, runs the transform, burns the FPS readout into the
//     output and JPEG-encodes it.
// 3.  **Terminated**: the frame stream has ended, cleanly or not. The runner
//     is inert from here on.
//
// The current frame only becomes `previous` after the transform has returned,
// by moving it into the runner. Transforms never see a mutable frame, so the
// stored frame is exactly what the camera sent. A frame that fails to filter or
// encode is dropped, but it still becomes `previous` and still ticks the clock.
//
// `run` hands each frame to the blocking pool together with the runner and
// waits for both to come back before pulling the next frame. Filtering never
// stalls the async workers serving other viewers, and a viewer's frames are
// still processed strictly in order.

use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use image::RgbImage;
use tracing::{debug, trace, warn};

use crate::error::{RelayError, Result};
use crate::multipart::EncodedFrame;
use crate::transform::TransformSpec;

pub const FPS_ORIGIN: (i64, i64) = (10, 30);
pub const FPS_COLOR: [u8; 3] = [255, 255, 255];
pub const FPS_SCALE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingFirstFrame,
    Streaming,
    Terminated,
}

/// Instantaneous frame rate from the gap between consecutive frames.
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
    fps: f64,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame arriving at `now` and returns the updated rate. The
    /// first tick reports 0. A zero gap keeps the previous value.
    pub fn tick(&mut self, now: Instant) -> f64 {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            if elapsed > 0.0 {
                self.fps = 1.0 / elapsed;
            }
        }
        self.last = Some(now);
        self.fps
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Applies one transform to a viewer's frames, in order.
pub struct PipelineRunner {
    spec: TransformSpec,
    jpeg_quality: u8,
    previous: Option<RgbImage>,
    meter: FpsMeter,
    phase: Phase,
    emitted: u64,
}

impl PipelineRunner {
    pub fn new(spec: TransformSpec, jpeg_quality: u8) -> Self {
        Self {
            spec,
            jpeg_quality,
            previous: None,
            meter: FpsMeter::new(),
            phase: Phase::AwaitingFirstFrame,
            emitted: 0,
        }
    }

    pub fn process(&mut self, frame: RgbImage) -> Option<EncodedFrame> {
        self.process_at(frame, Instant::now())
    }

    /// Same as `process`, with the arrival time supplied by the caller.
    pub fn process_at(&mut self, frame: RgbImage, now: Instant) -> Option<EncodedFrame> {
        if self.phase == Phase::Terminated {
            return None;
        }

        let fps = self.meter.tick(now);
        let output = self.spec.apply(self.previous.as_ref(), &frame);
        self.previous = Some(frame);
        self.phase = Phase::Streaming;

        let mut output = match output {
            Ok(Some(output)) => output,
            Ok(None) => {
                trace!(transform = self.spec.name, "waiting for a second frame");
                return None;
            }
            Err(err) => {
                debug!(transform = self.spec.name, error = %err, "dropping frame that failed to filter");
                return None;
            }
        };

        output.draw_text(FPS_ORIGIN, &format!("FPS: {fps:.2}"), FPS_COLOR, FPS_SCALE);
        match output.encode_jpeg(self.jpeg_quality) {
            Ok(jpeg) => {
                self.emitted += 1;
                Some(EncodedFrame {
                    jpeg: Bytes::from(jpeg),
                    width: output.width(),
                    height: output.height(),
                    fps,
                })
            }
            Err(err) => {
                debug!(transform = self.spec.name, error = %err, "dropping frame that failed to encode");
                None
            }
        }
    }

    pub fn terminate(&mut self) {
        self.phase = Phase::Terminated;
        self.previous = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fps(&self) -> f64 {
        self.meter.fps()
    }

    /// The last camera frame seen, exactly as it arrived.
    pub fn previous(&self) -> Option<&RgbImage> {
        self.previous.as_ref()
    }

    /// Frames successfully encoded so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn spec(&self) -> &TransformSpec {
        &self.spec
    }
}

/// Drives `runner` over a stream of decoded frames on the blocking pool. An
/// error from `frames` is passed through once and ends the output.
pub fn run<S>(frames: S, mut runner: PipelineRunner) -> impl Stream<Item = Result<EncodedFrame>>
where
    S: Stream<Item = Result<RgbImage>>,
{
    async_stream::stream! {
        futures::pin_mut!(frames);
        while let Some(next) = frames.next().await {
            match next {
                Ok(frame) => {
                    let arrived = Instant::now();
                    let job = tokio::task::spawn_blocking(move || {
                        let encoded = runner.process_at(frame, arrived);
                        (runner, encoded)
                    });
                    match job.await {
                        Ok((returned, encoded)) => {
                            runner = returned;
                            if let Some(encoded) = encoded {
                                yield Ok(encoded);
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "frame worker failed");
                            yield Err(RelayError::Worker(err));
                            return;
                        }
                    }
                }
                Err(err) => {
                    runner.terminate();
                    yield Err(err);
                    return;
                }
            }
        }
        runner.terminate();
        debug!(transform = runner.spec().name, emitted = runner.emitted(), "frame stream finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::ChunkLimits;
    use crate::decoder::decode_frames;
    use crate::frame::Frame;
    use crate::frame::tests::{gradient, jpeg};
    use crate::multipart::PART_HEADER;
    use crate::transform::{Layout, Registry, TransformSpec};
    use futures::stream;
    use image::GrayImage;

    fn runner(name: &str) -> PipelineRunner {
        let spec = Registry::default().get(name).expect("registered").clone();
        PipelineRunner::new(spec, 90)
    }

    #[test]
    fn fps_meter_reports_the_inverse_gap() {
        let start = Instant::now();
        let mut meter = FpsMeter::new();
        assert_eq!(meter.tick(start), 0.0);
        let fps = meter.tick(start + Duration::from_millis(40));
        assert!((fps - 25.0).abs() < 1e-6, "fps was {fps}");
        let fps = meter.tick(start + Duration::from_millis(140));
        assert!((fps - 10.0).abs() < 1e-6, "fps was {fps}");
    }

    #[test]
    fn fps_meter_keeps_the_last_value_on_a_zero_gap() {
        let start = Instant::now();
        let mut meter = FpsMeter::new();
        meter.tick(start);
        meter.tick(start + Duration::from_millis(50));
        assert_eq!(meter.tick(start + Duration::from_millis(50)), meter.fps());
        assert!((meter.fps() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn one_frame_transforms_emit_every_frame() {
        let mut runner = runner("passthrough");
        assert_eq!(runner.phase(), Phase::AwaitingFirstFrame);

        let start = Instant::now();
        let out: Vec<EncodedFrame> = (0..3)
            .filter_map(|i| runner.process_at(gradient(64, 48), start + Duration::from_millis(100 * i)))
            .collect();

        assert_eq!(out.len(), 3);
        assert_eq!(runner.phase(), Phase::Streaming);
        assert_eq!(out[0].fps, 0.0);
        assert!((out[1].fps - 10.0).abs() < 1e-6);
        assert!(out.iter().all(|f| (f.width, f.height) == (64, 48)));
        assert_eq!(runner.emitted(), 3);
    }

    #[test]
    fn motion_skips_the_first_frame() {
        let mut runner = runner("motion");
        let start = Instant::now();
        assert!(runner.process_at(gradient(64, 48), start).is_none());
        assert_eq!(runner.phase(), Phase::Streaming);

        let second = runner
            .process_at(gradient(64, 48), start + Duration::from_millis(50))
            .expect("second frame is emitted");
        assert!((second.fps - 20.0).abs() < 1e-6);
    }

    #[test]
    fn overlay_changes_only_the_output() {
        let plain = Frame::Color(gradient(200, 60)).encode_jpeg(90).expect("encode");
        let mut runner = runner("passthrough");
        let out = runner.process(gradient(200, 60)).expect("emitted");
        assert_ne!(out.jpeg.as_ref(), plain.as_slice());
    }

    #[test]
    fn terminated_runner_emits_nothing() {
        let mut runner = runner("passthrough");
        runner.terminate();
        assert_eq!(runner.phase(), Phase::Terminated);
        assert!(runner.process(gradient(16, 16)).is_none());
    }

    #[test]
    fn unencodable_output_is_dropped_but_the_frame_is_kept() {
        let spec = TransformSpec::one("empty", "/empty", Layout::Single, |_| Ok(Frame::Gray(GrayImage::new(0, 0))));
        let mut runner = PipelineRunner::new(spec, 90);
        let start = Instant::now();

        assert!(runner.process_at(gradient(16, 16), start).is_none());
        assert_eq!(runner.phase(), Phase::Streaming);
        assert_eq!(runner.emitted(), 0);
        assert_eq!(runner.previous(), Some(&gradient(16, 16)));

        assert!(runner.process_at(gradient(24, 24), start + Duration::from_millis(100)).is_none());
        assert_eq!(runner.previous(), Some(&gradient(24, 24)));
        assert!((runner.fps() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn filter_failure_drops_only_that_frame() {
        let spec = TransformSpec::two("motion", "/motion", Layout::Single, crate::transform::catalog::motion_diff);
        let mut runner = PipelineRunner::new(spec, 90);
        let start = Instant::now();

        assert!(runner.process_at(gradient(32, 32), start).is_none());
        // the camera switched resolution; absdiff cannot compare the pair
        assert!(runner.process_at(gradient(48, 32), start + Duration::from_millis(50)).is_none());
        assert_eq!(runner.previous().map(|p| p.dimensions()), Some((48, 32)));

        let out = runner
            .process_at(gradient(48, 32), start + Duration::from_millis(100))
            .expect("matching sizes filter again");
        assert_eq!((out.width, out.height), (48, 32));
        assert_eq!(runner.emitted(), 1);
    }

    #[tokio::test]
    async fn decoded_chunks_become_framed_parts() {
        let chunks = stream::iter((0..3).map(|_| Ok::<_, RelayError>(jpeg(640, 480))));
        let frames = decode_frames(chunks, ChunkLimits::default());
        let parts: Vec<_> = run(frames, runner("passthrough"))
            .map(|encoded| encoded.map(|f| f.to_part()))
            .collect()
            .await;

        assert_eq!(parts.len(), 3);
        for part in parts {
            let part = part.expect("no upstream error");
            assert!(part.starts_with(PART_HEADER));
            let body = &part[PART_HEADER.len()..part.len() - 2];
            let decoded = crate::frame::decode(body).expect("part carries a JPEG");
            assert_eq!(decoded.dimensions(), (640, 480));
        }
    }

    #[tokio::test]
    async fn undersized_chunks_do_not_produce_parts() {
        let chunks = stream::iter(vec![
            Ok::<_, RelayError>(Bytes::from(vec![0xFF; 50])),
            Ok(jpeg(320, 240)),
        ]);
        let frames = decode_frames(chunks, ChunkLimits::default());
        let out: Vec<_> = run(frames, runner("passthrough")).collect().await;
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn upstream_error_ends_the_output() {
        let frames = stream::iter(vec![
            Ok(gradient(32, 32)),
            Err(RelayError::UnknownTransform("stand-in".into())),
            Ok(gradient(32, 32)),
        ]);
        let out: Vec<_> = run(frames, runner("passthrough")).collect().await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn frames_keep_their_order_across_the_blocking_pool() {
        let widths = [16u32, 24, 32, 40, 48, 56];
        let frames = stream::iter(widths.map(|w| Ok(gradient(w, 8))));
        let out: Vec<u32> = run(frames, runner("smoothing"))
            .map(|encoded| encoded.expect("no upstream error").width)
            .collect()
            .await;
        assert_eq!(out, widths.map(|w| w * 3).to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn filtering_leaves_the_runtime_responsive() {
        let slow = TransformSpec::one("slow", "/slow", Layout::Single, |img| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Frame::Color(img.clone()))
        });
        let viewers: Vec<_> = (0..2)
            .map(|_| {
                let frames = stream::iter((0..2).map(|_| Ok(gradient(16, 16))));
                tokio::spawn(run(frames, PipelineRunner::new(slow.clone(), 90)).count())
            })
            .collect();

        // two slow viewers on two workers must not starve a third task
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        for viewer in viewers {
            assert_eq!(viewer.await.expect("viewer task"), 2);
        }
    }
}
