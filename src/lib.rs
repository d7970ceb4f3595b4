//! visiondash - live object-detection dashboard core
//!
//! This crate implements the engine behind a live detection dashboard:
//! capture frames from a camera, run an object-detection model on each one,
//! draw bounding-box overlays, and publish aggregate metrics to a shell.
//!
//! # Architecture
//!
//! Data flows one direction per tick:
//!
//! Capture Source → Frame Loop → Detector → Class Filter →
//! Render Overlay + Metrics Aggregator → Dashboard Shell
//!
//! The frame loop is strictly sequential: one inference in flight at most,
//! no pipelining. Each activation cycle is tagged with a generation; late
//! asynchronous results are discarded on a staleness check instead of being
//! applied to a superseded cycle.
//!
//! # Module Structure
//!
//! - `capture`: frame sources (synthetic `stub://`, V4L2 devices)
//! - `detect`: detector trait, backends, loading
//! - `filter`: confidence threshold and selected-class filtering
//! - `overlay`: bounding-box and label-chip rendering
//! - `metrics`: FPS window, snapshots, per-class counts
//! - `session`: the per-activation frame loop
//! - `supervisor`: activation lifecycle and device-mode switches
//! - `config`, `ui`: daemon configuration and terminal panel

pub mod capture;
pub mod config;
pub mod detect;
pub mod filter;
pub mod frame;
pub mod metrics;
pub mod overlay;
pub mod session;
pub mod supervisor;
pub mod ui;

pub use capture::{CaptureConfig, CaptureStats, WebcamSource};
pub use config::DaemonConfig;
pub use detect::{
    load_detector, BoundingBox, Detection, DeviceMode, ObjectDetector, SyntheticDetector,
};
pub use filter::{ClassFilter, FilterHandle, COMMON_CLASSES, SCORE_THRESHOLD};
pub use frame::VideoFrame;
pub use metrics::{class_counts, FpsWindow, MetricsSnapshot, FPS_WINDOW};
pub use overlay::OverlayCanvas;
pub use session::{
    DetectionSession, DetectionSink, GenerationLease, SessionContext, SharedMetrics,
};
pub use supervisor::{ActivationError, DetectionSupervisor};
pub use ui::{DashboardUi, UiMode};
