//! Detection session: the per-activation frame loop.
//!
//! A session owns the capture source, the detector, and the render canvas
//! for one activation cycle, and drives acquire → detect → filter → render →
//! metrics once per tick on a dedicated worker thread. All per-tick work is
//! strictly sequential, so at most one inference is ever in flight and ticks
//! never pipeline.
//!
//! Cancellation uses a staleness check rather than callback cancellation:
//! the worker captures the generation at spawn time and re-checks it (plus
//! the active flag) after the inference call returns, discarding results
//! that resolved into a superseded cycle. `stop()` flips the flag, bumps
//! nothing itself, and joins the worker; once it returns, the capture
//! device has been released and no further sink calls can occur.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::capture::WebcamSource;
use crate::detect::{Detection, ObjectDetector};
use crate::filter::FilterHandle;
use crate::metrics::{FpsWindow, MetricsSnapshot};
use crate::overlay::OverlayCanvas;

/// Monotonic counter tagging activation cycles.
///
/// Each activation bumps the counter; a worker captures the value at spawn
/// time and treats any later mismatch as "this cycle is over". Late results
/// from an in-flight inference are discarded instead of being applied to a
/// superseded cycle.
#[derive(Clone, Debug, Default)]
pub struct GenerationLease {
    current: Arc<AtomicU64>,
}

impl GenerationLease {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating all earlier ones.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// Per-tick outputs published to the dashboard shell.
///
/// Called from the session worker, once per completed tick. Implementations
/// must not block for long; the loop is sequential and a slow sink stalls
/// ticks.
pub trait DetectionSink: Send + Sync {
    fn on_fps_update(&self, fps: u32);
    fn on_inference_time_update(&self, inference_time_ms: f64);
    fn on_detections_update(&self, detections: &[Detection]);
}

#[derive(Debug, Default)]
struct MetricsState {
    snapshot: MetricsSnapshot,
    detections: Vec<Detection>,
}

/// The provided sink: a single owned state record, written only by the
/// session worker and snapshot-read by the presentation layer.
#[derive(Clone, Debug, Default)]
pub struct SharedMetrics {
    inner: Arc<Mutex<MetricsState>>,
}

impl SharedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the last published metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|state| state.snapshot)
            .unwrap_or_default()
    }

    /// Copy of the last published (filtered) detection sequence.
    pub fn last_detections(&self) -> Vec<Detection> {
        self.inner
            .lock()
            .map(|state| state.detections.clone())
            .unwrap_or_default()
    }
}

impl DetectionSink for SharedMetrics {
    fn on_fps_update(&self, fps: u32) {
        if let Ok(mut state) = self.inner.lock() {
            state.snapshot.fps = fps;
        }
    }

    fn on_inference_time_update(&self, inference_time_ms: f64) {
        if let Ok(mut state) = self.inner.lock() {
            state.snapshot.inference_time_ms = inference_time_ms;
        }
    }

    fn on_detections_update(&self, detections: &[Detection]) {
        if let Ok(mut state) = self.inner.lock() {
            state.snapshot.total_detections = detections.len();
            state.detections = detections.to_vec();
        }
    }
}

/// Everything the frame loop needs for one activation cycle.
///
/// The source must already be connected and the detector loaded; activation
/// failures belong to the supervisor, not the loop.
pub struct SessionContext {
    pub source: WebcamSource,
    pub detector: Box<dyn ObjectDetector>,
    pub filter: FilterHandle,
    pub sink: Arc<dyn DetectionSink>,
    pub lease: GenerationLease,
    /// Minimum spacing between tick starts; zero runs unpaced.
    pub tick_interval: Duration,
}

/// Handle to a running frame loop.
///
/// Dropping the session stops it; the worker is joined so teardown is
/// synchronous.
pub struct DetectionSession {
    active: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl DetectionSession {
    /// Spawn the frame loop on a dedicated worker thread.
    ///
    /// The worker captures the lease's current generation; it exits as soon
    /// as the active flag drops or the generation is superseded, releasing
    /// the capture device on the way out.
    pub fn spawn(context: SessionContext) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let worker_active = Arc::clone(&active);
        let worker = thread::spawn(move || run_loop(context, worker_active));

        Self {
            active,
            worker: Some(worker),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Halt the loop and wait for the worker to exit.
    ///
    /// Idempotent. When this returns, the capture device has been released
    /// and no further sink calls will occur.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("detection session worker panicked");
            }
        }
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(context: SessionContext, active: Arc<AtomicBool>) {
    let SessionContext {
        mut source,
        mut detector,
        filter,
        sink,
        lease,
        tick_interval,
    } = context;

    let generation = lease.current();
    let mut canvas = OverlayCanvas::new();
    let mut fps_window = FpsWindow::new(Instant::now());
    let mut last_health_log = Instant::now();
    log::debug!(
        "session worker started (generation {}, detector {})",
        generation,
        detector.name()
    );

    while active.load(Ordering::SeqCst) && lease.is_current(generation) {
        let tick_start = Instant::now();

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = source.stats();
            log::info!(
                "capture health={} frames={} device={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.device
            );
            last_health_log = Instant::now();
        }

        match source.poll_frame() {
            // Wait state: the source has no decoded data yet.
            Ok(None) => {}
            Ok(Some(frame)) => {
                if let Err(err) = run_tick(
                    &frame,
                    &mut *detector,
                    &filter,
                    &*sink,
                    &lease,
                    generation,
                    &active,
                    &mut canvas,
                    &mut fps_window,
                ) {
                    // Per-tick failures are non-fatal; the next tick retries.
                    log::warn!("tick failed: {err:#}");
                }
            }
            Err(err) => {
                log::warn!("frame capture failed: {err:#}");
            }
        }

        pace(tick_start, tick_interval, &active);
    }

    source.stop();
    log::debug!("session worker exited (generation {})", generation);
}

#[allow(clippy::too_many_arguments)]
fn run_tick(
    frame: &crate::frame::VideoFrame,
    detector: &mut dyn ObjectDetector,
    filter: &FilterHandle,
    sink: &dyn DetectionSink,
    lease: &GenerationLease,
    generation: u64,
    active: &AtomicBool,
    canvas: &mut OverlayCanvas,
    fps_window: &mut FpsWindow,
) -> anyhow::Result<()> {
    canvas.begin_frame(frame)?;

    let inference_start = Instant::now();
    let result = detector.detect(&frame.data, frame.width, frame.height);
    let inference_time_ms = inference_start.elapsed().as_secs_f64() * 1000.0;

    // The inference call is the long suspension point; its result may have
    // resolved into a cycle that was deactivated or superseded meanwhile.
    if !active.load(Ordering::SeqCst) || !lease.is_current(generation) {
        return Ok(());
    }

    let detections = result?;
    let filtered = filter.snapshot().apply(detections);

    sink.on_inference_time_update(inference_time_ms);
    sink.on_detections_update(&filtered);
    canvas.draw_detections(&filtered);

    if let Some(fps) = fps_window.record_tick(Instant::now()) {
        sink.on_fps_update(fps);
    }
    Ok(())
}

/// Sleep out the remainder of the tick interval in short slices so a stop
/// request is honored promptly.
fn pace(tick_start: Instant, tick_interval: Duration, active: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(5);

    loop {
        if !active.load(Ordering::SeqCst) {
            return;
        }
        let elapsed = tick_start.elapsed();
        if elapsed >= tick_interval {
            return;
        }
        thread::sleep(SLICE.min(tick_interval - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureConfig;
    use crate::detect::{load_detector, DeviceMode};

    fn stub_context(model: &str, sink: Arc<dyn DetectionSink>) -> SessionContext {
        let mut source = WebcamSource::open(CaptureConfig {
            device: "stub://warmup:1".to_string(),
            width: 96,
            height: 72,
            target_fps: 0,
        })
        .unwrap();
        source.connect().unwrap();

        let lease = GenerationLease::new();
        lease.advance();
        SessionContext {
            source,
            detector: load_detector(model, DeviceMode::Software).unwrap(),
            filter: FilterHandle::default(),
            sink,
            lease,
            tick_interval: Duration::ZERO,
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loop_publishes_filtered_detections() {
        let metrics = SharedMetrics::new();
        let mut session =
            DetectionSession::spawn(stub_context("stub://walk", Arc::new(metrics.clone())));

        wait_for(|| metrics.snapshot().total_detections > 0);
        session.stop();

        // The walk scene has one sub-threshold detection (car at 0.30).
        let detections = metrics.last_detections();
        assert!(detections.iter().all(|d| d.score > 0.5));
        assert!(detections.iter().any(|d| d.label == "person"));
        assert!(metrics.snapshot().inference_time_ms >= 0.0);
    }

    #[test]
    fn generation_mismatch_discards_results() {
        let metrics = SharedMetrics::new();
        let context = stub_context("stub://walk", Arc::new(metrics.clone()));
        let lease = context.lease.clone();
        let mut session = DetectionSession::spawn(context);

        wait_for(|| metrics.snapshot().total_detections > 0);

        // Superseding the generation halts the loop without touching the
        // active flag.
        lease.advance();
        session.stop();
        assert!(!session.is_active());
    }

    #[test]
    fn stop_is_idempotent() {
        let metrics = SharedMetrics::new();
        let mut session =
            DetectionSession::spawn(stub_context("stub://empty", Arc::new(metrics)));

        thread::sleep(Duration::from_millis(30));
        session.stop();
        session.stop();
        assert!(!session.is_active());
    }

    #[test]
    fn per_tick_failures_do_not_kill_the_loop() {
        let metrics = SharedMetrics::new();
        let mut session =
            DetectionSession::spawn(stub_context("stub://flaky", Arc::new(metrics.clone())));

        // The flaky detector fails every other call; the loop must keep
        // going and still publish the successful ticks.
        wait_for(|| metrics.snapshot().total_detections > 0);
        session.stop();
    }
}
