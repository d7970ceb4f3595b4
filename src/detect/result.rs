use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates of the source frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }
}

/// One model output: label, confidence score, bounding box.
///
/// Produced fresh each tick; never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in `0..=1`.
    pub score: f32,
    pub bounds: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f32, bounds: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bounds,
        }
    }
}
