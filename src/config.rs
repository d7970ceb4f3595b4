use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::capture::CaptureConfig;
use crate::detect::DeviceMode;

const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_MODEL_ID: &str = "stub://walk";
const DEFAULT_DEVICE_MODE: DeviceMode = DeviceMode::Accelerated;

#[derive(Debug, Deserialize, Default)]
struct DaemonConfigFile {
    model_id: Option<String>,
    device: Option<String>,
    camera: Option<CameraConfigFile>,
    classes: Option<ClassConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassConfigFile {
    selected: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub model_id: String,
    pub device: DeviceMode,
    pub camera: CaptureConfig,
    /// Labels selected at startup; empty means accept all.
    pub selected_classes: Vec<String>,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VISIONDASH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DaemonConfigFile) -> Result<Self> {
        let model_id = file
            .model_id
            .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string());
        let device = match file.device.as_deref() {
            Some(mode) => mode.parse()?,
            None => DEFAULT_DEVICE_MODE,
        };
        let camera = CaptureConfig {
            device: file
                .camera
                .as_ref()
                .and_then(|camera| camera.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: file
                .camera
                .as_ref()
                .and_then(|camera| camera.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|camera| camera.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
        };
        let selected_classes = file
            .classes
            .and_then(|classes| classes.selected)
            .unwrap_or_default();
        Ok(Self {
            model_id,
            device,
            camera,
            selected_classes,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model_id) = std::env::var("VISIONDASH_MODEL") {
            if !model_id.trim().is_empty() {
                self.model_id = model_id;
            }
        }
        if let Ok(device) = std::env::var("VISIONDASH_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device.parse()?;
            }
        }
        if let Ok(camera) = std::env::var("VISIONDASH_CAMERA") {
            if !camera.trim().is_empty() {
                self.camera.device = camera;
            }
        }
        if let Ok(fps) = std::env::var("VISIONDASH_CAMERA_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("VISIONDASH_CAMERA_FPS must be an integer"))?;
            self.camera.target_fps = fps;
        }
        if let Ok(classes) = std::env::var("VISIONDASH_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.selected_classes = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(anyhow!("model_id must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }

        // Selected classes are set-valued: order is irrelevant and
        // duplicates collapse.
        self.selected_classes = {
            let mut seen = std::collections::HashSet::new();
            self.selected_classes
                .iter()
                .map(|label| label.trim().to_lowercase())
                .filter(|label| !label.is_empty())
                .filter(|label| seen.insert(label.clone()))
                .collect()
        };
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DaemonConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
