use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::{DeviceMode, ObjectDetector};
use crate::detect::result::{BoundingBox, Detection};

/// Behaviors selectable through `stub://` model ids.
///
/// `walk` is the default scene; the others exist so lifecycle tests and
/// demos can exercise slow, failing, and empty inference through the
/// public loader.
#[derive(Clone, Copy, Debug)]
enum Behavior {
    /// Deterministic scene: a drifting person, a low-confidence car, a cup.
    Walk,
    /// Walk output after a fixed per-call delay.
    Slow(Duration),
    /// Walk output on even calls, an error on odd calls.
    Flaky,
    /// No detections.
    Empty,
}

/// Synthetic detector backing `stub://` model ids.
///
/// Accepts either device mode; the mode is recorded but does not change the
/// output, which keeps activation and device-switch flows exercisable
/// without model files.
pub struct SyntheticDetector {
    behavior: Behavior,
    device: DeviceMode,
    frame_count: u64,
    call_count: u64,
}

impl SyntheticDetector {
    pub fn new(device: DeviceMode) -> Self {
        Self::with_behavior(Behavior::Walk, device)
    }

    /// Parse the part of a `stub://` model id after the scheme.
    ///
    /// Accepted specs: `walk` (or empty), `empty`, `flaky`, `slow:<ms>`.
    pub fn from_spec(spec: &str, device: DeviceMode) -> Result<Self> {
        let behavior = match spec {
            "" | "walk" => Behavior::Walk,
            "empty" => Behavior::Empty,
            "flaky" => Behavior::Flaky,
            _ => {
                if let Some(ms) = spec.strip_prefix("slow:") {
                    let ms: u64 = ms
                        .parse()
                        .map_err(|_| anyhow!("stub 'slow:<ms>' requires integer milliseconds"))?;
                    Behavior::Slow(Duration::from_millis(ms))
                } else {
                    return Err(anyhow!("unknown stub detector spec '{}'", spec));
                }
            }
        };
        Ok(Self::with_behavior(behavior, device))
    }

    fn with_behavior(behavior: Behavior, device: DeviceMode) -> Self {
        Self {
            behavior,
            device,
            frame_count: 0,
            call_count: 0,
        }
    }

    fn scene(&self, width: u32, height: u32) -> Vec<Detection> {
        let w = width as f32;
        let h = height as f32;
        // 60-frame horizontal walk cycle for the primary subject.
        let drift = (self.frame_count % 60) as f32 / 60.0;
        let px = w * (0.10 + 0.30 * drift);

        vec![
            Detection::new(
                "person",
                0.92,
                BoundingBox::new(px, h * 0.20, px + w * 0.25, h * 0.80),
            ),
            Detection::new(
                "car",
                0.30,
                BoundingBox::new(w * 0.55, h * 0.55, w * 0.90, h * 0.85),
            ),
            Detection::new(
                "cup",
                0.66,
                BoundingBox::new(w * 0.40, h * 0.10, w * 0.48, h * 0.22),
            ),
        ]
    }
}

impl ObjectDetector for SyntheticDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn device(&self) -> DeviceMode {
        self.device
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        self.call_count += 1;
        match self.behavior {
            Behavior::Walk => {}
            Behavior::Slow(delay) => thread::sleep(delay),
            Behavior::Flaky => {
                if self.call_count % 2 == 1 {
                    return Err(anyhow!("synthetic inference fault"));
                }
            }
            Behavior::Empty => return Ok(Vec::new()),
        }

        self.frame_count += 1;
        Ok(self.scene(width, height))
    }
}
