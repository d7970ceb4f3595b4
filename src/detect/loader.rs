use anyhow::{anyhow, Result};

use crate::detect::backend::{DeviceMode, ObjectDetector};
use crate::detect::backends::SyntheticDetector;

/// Load a detector instance for a model id and device mode.
///
/// Model ids:
/// - `stub://<spec>`: synthetic detector, available on both modes. Specs:
///   `walk` (default), `empty`, `flaky`, `slow:<ms>`.
/// - `<path>.onnx`: local ONNX model via tract (feature `backend-tract`),
///   software mode only.
///
/// The returned instance is bound to `device` for its lifetime; callers that
/// switch modes must drop it and load again.
pub fn load_detector(model_id: &str, device: DeviceMode) -> Result<Box<dyn ObjectDetector>> {
    if let Some(spec) = model_id.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticDetector::from_spec(spec, device)?));
    }

    if model_id.ends_with(".onnx") {
        #[cfg(feature = "backend-tract")]
        {
            return match device {
                DeviceMode::Software => Ok(Box::new(
                    crate::detect::backends::TractDetector::load(model_id)?,
                )),
                DeviceMode::Accelerated => Err(anyhow!(
                    "no accelerated execution backend is compiled in; select software mode"
                )),
            };
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            return Err(anyhow!(
                "ONNX models require the backend-tract feature (model '{}', {} mode)",
                model_id,
                device
            ));
        }
    }

    Err(anyhow!(
        "no detector backend for model '{}' on {} mode",
        model_id,
        device
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_models_load_on_both_modes() {
        let software = load_detector("stub://walk", DeviceMode::Software).unwrap();
        assert_eq!(software.device(), DeviceMode::Software);

        let accelerated = load_detector("stub://walk", DeviceMode::Accelerated).unwrap();
        assert_eq!(accelerated.device(), DeviceMode::Accelerated);
    }

    #[test]
    fn unknown_models_are_rejected() {
        let err = load_detector("model.tflite", DeviceMode::Software).unwrap_err();
        assert!(err.to_string().contains("model.tflite"));
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn onnx_without_backend_names_the_missing_feature() {
        let err = load_detector("detr.onnx", DeviceMode::Software).unwrap_err();
        assert!(err.to_string().contains("backend-tract"));
    }
}
