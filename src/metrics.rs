//! Dashboard metrics.
//!
//! FPS is a raw count of ticks completed in the last full wall-clock second,
//! reset at each window boundary. It is never smoothed or averaged; any
//! visual capping is left to the presentation layer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detect::Detection;

/// Width of the FPS counting window.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Rolling FPS counter.
///
/// Takes explicit timestamps so the window is testable with a synthetic
/// clock.
#[derive(Debug)]
pub struct FpsWindow {
    frame_count: u32,
    window_start: Instant,
}

impl FpsWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start: now,
        }
    }

    /// Record one completed tick. Returns the finished window's count when
    /// the window boundary is crossed, resetting the counter.
    pub fn record_tick(&mut self, now: Instant) -> Option<u32> {
        self.frame_count += 1;
        if now.duration_since(self.window_start) >= FPS_WINDOW {
            let fps = self.frame_count;
            self.frame_count = 0;
            self.window_start = now;
            Some(fps)
        } else {
            None
        }
    }

    /// Ticks recorded in the current (unfinished) window.
    pub fn pending_ticks(&self) -> u32 {
        self.frame_count
    }
}

/// Last published dashboard metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Ticks completed in the last full second (raw, uncapped).
    pub fps: u32,
    /// Duration of the most recent inference call.
    pub inference_time_ms: f64,
    /// Size of the most recent filtered detection sequence.
    pub total_detections: usize,
}

/// Per-label counts for a detection sequence, sorted by count descending
/// with a label tiebreak for deterministic output.
pub fn class_counts(detections: &[Detection]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for detection in detections {
        *counts.entry(detection.label.as_str()).or_insert(0) += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, count)| (label.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}
