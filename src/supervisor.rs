//! Activation supervisor.
//!
//! Owns the activation lifecycle for the dashboard shell: acquiring the
//! camera, loading the detector for the configured device mode, spawning the
//! frame loop, and tearing everything down again. The stop-before-start
//! discipline lives here: a device-mode switch fully deactivates the old
//! cycle before the new one begins, so two sessions never share the render
//! surface or run two detectors concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::{CaptureConfig, WebcamSource};
use crate::detect::{load_detector, DeviceMode};
use crate::filter::FilterHandle;
use crate::session::{DetectionSession, DetectionSink, GenerationLease, SessionContext};

/// Why an activation cycle never started.
///
/// Both variants are terminal for the current cycle; the user re-triggers
/// activation after fixing the cause. Per-tick detection failures are not
/// represented here, they are handled inside the loop.
#[derive(Debug)]
pub enum ActivationError {
    /// Camera permission or hardware failure.
    Acquisition { source: anyhow::Error },
    /// Detector initialization failure; names the requested device mode.
    ModelLoad {
        device: DeviceMode,
        source: anyhow::Error,
    },
}

impl ActivationError {
    pub fn code(&self) -> &'static str {
        match self {
            ActivationError::Acquisition { .. } => "CAMERA_ACQUISITION_FAILED",
            ActivationError::ModelLoad { .. } => "MODEL_LOAD_FAILED",
        }
    }
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::Acquisition { source } => {
                write!(f, "{}: could not access the camera: {}", self.code(), source)
            }
            ActivationError::ModelLoad { device, source } => {
                write!(
                    f,
                    "{}: could not load the detection model on {} mode: {}",
                    self.code(),
                    device,
                    source
                )
            }
        }
    }
}

impl std::error::Error for ActivationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActivationError::Acquisition { source } => Some(source.as_ref()),
            ActivationError::ModelLoad { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Top-level state owner for the detection dashboard.
///
/// Holds the pieces that survive deactivation (class filter, metrics sink,
/// generation lease) and the configuration used to build each activation
/// cycle.
pub struct DetectionSupervisor {
    capture: CaptureConfig,
    model_id: String,
    device: DeviceMode,
    filter: FilterHandle,
    sink: Arc<dyn DetectionSink>,
    lease: GenerationLease,
    session: Option<DetectionSession>,
}

impl DetectionSupervisor {
    pub fn new(
        capture: CaptureConfig,
        model_id: impl Into<String>,
        device: DeviceMode,
        filter: FilterHandle,
        sink: Arc<dyn DetectionSink>,
    ) -> Self {
        Self {
            capture,
            model_id: model_id.into(),
            device,
            filter,
            sink,
            lease: GenerationLease::new(),
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn device(&self) -> DeviceMode {
        self.device
    }

    pub fn filter(&self) -> &FilterHandle {
        &self.filter
    }

    /// Start an activation cycle: acquire the camera, load and warm up the
    /// detector, then spawn the frame loop. No-op when already active.
    ///
    /// On failure nothing keeps running: the camera is released and the
    /// loop never starts.
    pub fn activate(&mut self) -> Result<(), ActivationError> {
        if self.session.is_some() {
            return Ok(());
        }

        self.lease.advance();

        let mut source = WebcamSource::open(self.capture.clone())
            .map_err(|source| ActivationError::Acquisition { source })?;
        source
            .connect()
            .map_err(|source| ActivationError::Acquisition { source })?;

        let mut detector = match load_detector(&self.model_id, self.device) {
            Ok(detector) => detector,
            Err(err) => {
                source.stop();
                return Err(ActivationError::ModelLoad {
                    device: self.device,
                    source: err,
                });
            }
        };
        if let Err(err) = detector.warm_up() {
            source.stop();
            return Err(ActivationError::ModelLoad {
                device: self.device,
                source: err,
            });
        }

        log::info!(
            "activating: device={} model={} detector={} camera={}",
            self.device,
            self.model_id,
            detector.name(),
            self.capture.device
        );

        self.session = Some(DetectionSession::spawn(SessionContext {
            source,
            detector,
            filter: self.filter.clone(),
            sink: Arc::clone(&self.sink),
            lease: self.lease.clone(),
            tick_interval: self.tick_interval(),
        }));
        Ok(())
    }

    /// End the current activation cycle. Idempotent.
    ///
    /// The generation is advanced before the worker is joined, so an
    /// inference that is in flight at this moment resolves stale and its
    /// result is discarded rather than published.
    pub fn deactivate(&mut self) {
        self.lease.advance();
        if let Some(mut session) = self.session.take() {
            session.stop();
            log::info!("deactivated");
        }
    }

    /// Switch the execution backend.
    ///
    /// A loaded detector is not mode-mutable in place: when active, the old
    /// cycle is fully stopped (detector dropped, camera released), then a
    /// fresh cycle starts under the new mode. An activation failure under
    /// the new mode leaves the supervisor inactive with the error surfaced.
    pub fn set_device(&mut self, device: DeviceMode) -> Result<(), ActivationError> {
        if device == self.device {
            return Ok(());
        }

        let was_active = self.session.is_some();
        if was_active {
            self.deactivate();
        }
        self.device = device;
        if was_active {
            self.activate()?;
        }
        Ok(())
    }

    fn tick_interval(&self) -> Duration {
        if self.capture.target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(1000 / self.capture.target_fps as u64)
        }
    }
}

impl Drop for DetectionSupervisor {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SharedMetrics;

    fn supervisor(device: &str, model: &str) -> (DetectionSupervisor, SharedMetrics) {
        let metrics = SharedMetrics::new();
        let supervisor = DetectionSupervisor::new(
            CaptureConfig {
                device: device.to_string(),
                width: 96,
                height: 72,
                target_fps: 0,
            },
            model,
            DeviceMode::Accelerated,
            FilterHandle::default(),
            Arc::new(metrics.clone()),
        );
        (supervisor, metrics)
    }

    #[test]
    fn activate_is_a_no_op_when_active() {
        let (mut supervisor, _) = supervisor("stub://camera", "stub://walk");
        supervisor.activate().unwrap();
        assert!(supervisor.is_active());
        supervisor.activate().unwrap();
        assert!(supervisor.is_active());
        supervisor.deactivate();
        assert!(!supervisor.is_active());
    }

    #[test]
    fn acquisition_failure_never_starts_the_loop() {
        let (mut supervisor, metrics) = supervisor("stub://warmup:abc", "stub://walk");
        let err = supervisor.activate().unwrap_err();
        assert_eq!(err.code(), "CAMERA_ACQUISITION_FAILED");
        assert!(!supervisor.is_active());
        assert_eq!(metrics.snapshot().total_detections, 0);
    }

    #[test]
    fn model_load_failure_names_the_device_mode() {
        let (mut supervisor, _) = supervisor("stub://camera", "stub://tracker");
        let err = supervisor.activate().unwrap_err();
        assert_eq!(err.code(), "MODEL_LOAD_FAILED");
        assert!(err.to_string().contains("accelerated"));
        assert!(!supervisor.is_active());
    }

    #[test]
    fn set_device_while_inactive_only_records_the_mode() {
        let (mut supervisor, _) = supervisor("stub://camera", "stub://walk");
        supervisor.set_device(DeviceMode::Software).unwrap();
        assert_eq!(supervisor.device(), DeviceMode::Software);
        assert!(!supervisor.is_active());
    }
}
