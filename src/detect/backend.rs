use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::result::Detection;

/// Execution backend for a loaded detector.
///
/// A loaded detector is bound to one mode for its lifetime; switching modes
/// means dropping the instance and loading a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    /// Hardware-accelerated execution.
    Accelerated,
    /// CPU execution.
    Software,
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceMode::Accelerated => "accelerated",
            DeviceMode::Software => "software",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerated" => Ok(DeviceMode::Accelerated),
            "software" => Ok(DeviceMode::Software),
            other => Err(anyhow!(
                "unknown device mode '{}' (expected 'accelerated' or 'software')",
                other
            )),
        }
    }
}

/// Object detector trait.
///
/// Implementations must treat the pixel slice as read-only and ephemeral:
/// frames are never retained beyond one `detect` call. Detectors run inside
/// the frame loop's worker, so `&mut self` state is fine; `Send` is required
/// to move the detector into the worker.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Execution mode this instance was loaded with.
    fn device(&self) -> DeviceMode;

    /// Run detection on one RGB24 frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_mode_round_trips_through_strings() {
        assert_eq!(
            "accelerated".parse::<DeviceMode>().unwrap(),
            DeviceMode::Accelerated
        );
        assert_eq!(
            " Software ".parse::<DeviceMode>().unwrap(),
            DeviceMode::Software
        );
        assert!("webgpu".parse::<DeviceMode>().is_err());
        assert_eq!(DeviceMode::Accelerated.to_string(), "accelerated");
    }
}
