//! Frame capture sources.

pub mod webcam;

pub use webcam::{CaptureConfig, CaptureStats, WebcamSource};
