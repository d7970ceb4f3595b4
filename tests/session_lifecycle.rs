//! Frame loop lifecycle: warmup wait states, per-tick failures, and
//! cancellation of in-flight work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use visiondash::{
    CaptureConfig, Detection, DetectionSink, DetectionSupervisor, DeviceMode, FilterHandle,
};

/// Counts every sink call so tests can assert exactly when publishing stops.
#[derive(Default)]
struct RecordingSink {
    fps_updates: AtomicU64,
    inference_updates: AtomicU64,
    detection_updates: AtomicU64,
}

impl RecordingSink {
    fn publishes(&self) -> u64 {
        self.fps_updates.load(Ordering::SeqCst)
            + self.inference_updates.load(Ordering::SeqCst)
            + self.detection_updates.load(Ordering::SeqCst)
    }
}

impl DetectionSink for RecordingSink {
    fn on_fps_update(&self, _fps: u32) {
        self.fps_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_inference_time_update(&self, _inference_time_ms: f64) {
        self.inference_updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_detections_update(&self, _detections: &[Detection]) {
        self.detection_updates.fetch_add(1, Ordering::SeqCst);
    }
}

fn capture(device: &str) -> CaptureConfig {
    CaptureConfig {
        device: device.to_string(),
        width: 96,
        height: 72,
        target_fps: 0,
    }
}

fn supervisor(device: &str, model: &str, sink: Arc<dyn DetectionSink>) -> DetectionSupervisor {
    DetectionSupervisor::new(
        capture(device),
        model,
        DeviceMode::Software,
        FilterHandle::default(),
        sink,
    )
}

fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn warmup_polls_delay_but_do_not_fail_the_loop() {
    let sink = Arc::new(RecordingSink::default());
    let mut supervisor = supervisor("stub://warmup:10", "stub://walk", sink.clone());

    supervisor.activate().expect("activate");
    // The source yields "not ready" for the first ten polls; the loop keeps
    // rescheduling until frames arrive.
    wait_for(|| sink.publishes() > 0);
    supervisor.deactivate();
}

#[test]
fn deactivation_cancels_in_flight_work() {
    let sink = Arc::new(RecordingSink::default());
    // 100ms per inference call keeps one in flight at deactivation time.
    let mut supervisor = supervisor("stub://warmup:0", "stub://slow:100", sink.clone());

    supervisor.activate().expect("activate");
    wait_for(|| sink.detection_updates.load(Ordering::SeqCst) > 0);

    supervisor.deactivate();
    let after_deactivate = sink.publishes();

    // The in-flight inference resolves stale; nothing more is published.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(sink.publishes(), after_deactivate);
}

#[test]
fn per_tick_failures_are_non_fatal() {
    let sink = Arc::new(RecordingSink::default());
    // The flaky detector errors on every other call.
    let mut supervisor = supervisor("stub://warmup:0", "stub://flaky", sink.clone());

    supervisor.activate().expect("activate");
    // Multiple successful publishes means the loop survived the failing
    // ticks in between.
    wait_for(|| sink.detection_updates.load(Ordering::SeqCst) >= 3);
    supervisor.deactivate();
}

#[test]
fn reactivation_starts_a_fresh_cycle() {
    let sink = Arc::new(RecordingSink::default());
    let mut supervisor = supervisor("stub://warmup:0", "stub://walk", sink.clone());

    supervisor.activate().expect("first activation");
    wait_for(|| sink.publishes() > 0);
    supervisor.deactivate();

    let between = sink.publishes();
    supervisor.activate().expect("second activation");
    wait_for(|| sink.publishes() > between);
    supervisor.deactivate();
}
