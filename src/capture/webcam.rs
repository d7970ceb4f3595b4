//! Webcam frame source.
//!
//! This module provides `WebcamSource` for capturing frames from local
//! camera devices.
//!
//! The webcam source is responsible for:
//! - Connecting to a local device node (e.g., /dev/video0)
//! - Capturing RGB24 frames in-memory
//! - Reporting "not ready yet" while the device is still warming up
//! - Producing `VideoFrame` instances
//!
//! Polling before the first decoded frame is available yields `Ok(None)`;
//! the frame loop treats that as a wait state and reschedules, not as an
//! error. `stop()` releases the underlying device handle; a stopped source
//! rejects further polls.

use anyhow::{anyhow, Result};
#[cfg(feature = "capture-v4l2")]
use anyhow::Context;
#[cfg(feature = "capture-v4l2")]
use ouroboros::self_referencing;
#[cfg(feature = "capture-v4l2")]
use std::time::{Duration, Instant};

#[cfg(feature = "capture-v4l2")]
use crate::frame::rgb_len;
use crate::frame::VideoFrame;

/// Configuration for a webcam source.
#[derive(Clone, Debug)]
pub struct CaptureConfig {
    /// Device path (e.g., "/dev/video0") or a `stub://` spec.
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate requested from the device.
    pub target_fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

/// Webcam frame source.
///
/// Uses libv4l for real devices, with a synthetic fallback for `stub://`
/// paths. Synthetic specs: `stub://<name>` (ready after a short warmup),
/// `stub://warmup:<polls>` (explicit warmup length, for tests).
pub struct WebcamSource {
    device: String,
    backend: CaptureBackend,
}

enum CaptureBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "capture-v4l2")]
    Device(DeviceSource),
}

impl WebcamSource {
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let device = config.device.clone();
        if let Some(spec) = config.device.strip_prefix("stub://") {
            let spec = spec.to_string();
            Ok(Self {
                device,
                backend: CaptureBackend::Synthetic(SyntheticSource::from_spec(&spec, config)?),
            })
        } else {
            #[cfg(feature = "capture-v4l2")]
            {
                Ok(Self {
                    device,
                    backend: CaptureBackend::Device(DeviceSource::new(config)),
                })
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                anyhow::bail!("camera device {} requires the capture-v4l2 feature", device)
            }
        }
    }

    /// Acquire the camera stream.
    ///
    /// Failure here is an acquisition failure (permission or hardware); the
    /// frame loop never starts in that case.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "capture-v4l2")]
            CaptureBackend::Device(source) => source.connect(),
        }
    }

    /// Poll for the next decoded frame.
    ///
    /// Returns `Ok(None)` while the source has not produced decoded data
    /// yet (a wait state), `Ok(Some(frame))` once frames are flowing, and
    /// `Err` on capture faults or polls after `stop()`.
    pub fn poll_frame(&mut self) -> Result<Option<VideoFrame>> {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.poll_frame(),
            #[cfg(feature = "capture-v4l2")]
            CaptureBackend::Device(source) => source.poll_frame(),
        }
    }

    /// Release the underlying device handle.
    ///
    /// Idempotent; the source stays stopped until dropped.
    pub fn stop(&mut self) {
        match &mut self.backend {
            CaptureBackend::Synthetic(source) => source.stop(),
            #[cfg(feature = "capture-v4l2")]
            CaptureBackend::Device(source) => source.stop(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CaptureBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "capture-v4l2")]
            CaptureBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CaptureStats {
        let frames_captured = match &self.backend {
            CaptureBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "capture-v4l2")]
            CaptureBackend::Device(source) => source.frame_count,
        };
        CaptureStats {
            frames_captured,
            device: self.device.clone(),
        }
    }
}

/// Statistics for a webcam source.
#[derive(Clone, Debug)]
pub struct CaptureStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and demos
// ----------------------------------------------------------------------------

const DEFAULT_WARMUP_POLLS: u32 = 2;

struct SyntheticSource {
    config: CaptureConfig,
    warmup_polls: u32,
    polls: u64,
    frame_count: u64,
    connected: bool,
    stopped: bool,
}

impl SyntheticSource {
    fn from_spec(spec: &str, config: CaptureConfig) -> Result<Self> {
        let warmup_polls = match spec.strip_prefix("warmup:") {
            Some(polls) => polls
                .parse()
                .map_err(|_| anyhow!("stub 'warmup:<polls>' requires an integer"))?,
            None => DEFAULT_WARMUP_POLLS,
        };
        Ok(Self {
            config,
            warmup_polls,
            polls: 0,
            frame_count: 0,
            connected: false,
            stopped: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.stopped = false;
        log::info!("WebcamSource: synthetic source {} ready", self.config.device);
        Ok(())
    }

    fn poll_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.stopped {
            return Err(anyhow!("webcam source is stopped"));
        }
        if !self.connected {
            return Err(anyhow!("webcam source is not connected"));
        }

        // Model the span before the device delivers decoded data.
        self.polls += 1;
        if self.polls <= self.warmup_polls as u64 {
            return Ok(None);
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        let frame = VideoFrame::new(pixels, self.config.width, self.config.height)?;
        Ok(Some(frame))
    }

    /// Flat backdrop with a brighter block sweeping left to right.
    ///
    /// The sweep keeps consecutive frames distinct and gives the overlay
    /// something spatially plausible to sit on top of; the pacing roughly
    /// matches the stub detector's walk cycle.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![96u8; width * height * 3];

        let block_w = (width / 5).max(1);
        let sweep_span = width.saturating_sub(block_w).max(1);
        let x0 = (self.frame_count as usize * 7) % sweep_span;
        let y0 = height / 4;
        let y1 = height.saturating_sub(height / 4);

        for y in y0..y1 {
            let row = y * width;
            for x in x0..x0 + block_w {
                let at = (row + x) * 3;
                pixels[at] = 208;
                pixels[at + 1] = 184;
                pixels[at + 2] = 148;
            }
        }
        pixels
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            log::info!("WebcamSource: released {} (synthetic)", self.config.device);
        }
    }

    fn is_healthy(&self) -> bool {
        self.connected && !self.stopped
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 source using libv4l
// ----------------------------------------------------------------------------

/// A device that has gone this long without a frame is considered stalled,
/// whatever rate it was configured for.
#[cfg(feature = "capture-v4l2")]
const STALL_AFTER: Duration = Duration::from_secs(2);

#[cfg(feature = "capture-v4l2")]
struct DeviceSource {
    config: CaptureConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    stopped: bool,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "capture-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "capture-v4l2")]
impl DeviceSource {
    fn new(config: CaptureConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
            stopped: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open {}", self.config.device))?;

        let (width, height) = self.negotiate_rgb24(&mut device)?;
        self.request_frame_rate(&mut device);

        self.state = Some(
            DeviceStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .context("map capture buffers")
                },
            }
            .try_build()?,
        );
        self.active_width = width;
        self.active_height = height;
        self.last_error = None;
        self.last_frame_at = None;
        self.stopped = false;

        log::info!(
            "WebcamSource: {} streaming at {}x{}",
            self.config.device,
            width,
            height
        );
        Ok(())
    }

    /// Ask the driver for RGB24 at the configured size.
    ///
    /// The overlay draws straight onto RGB24, so a device that cannot
    /// deliver it is unusable and connection fails; a different size is
    /// fine, the negotiated one is captured instead.
    fn negotiate_rgb24(&self, device: &mut v4l::Device) -> Result<(u32, u32)> {
        use v4l::video::Capture;

        let rgb24 = v4l::FourCC::new(b"RGB3");
        let mut wanted = device.format().context("query camera format")?;
        wanted.width = self.config.width;
        wanted.height = self.config.height;
        wanted.fourcc = rgb24;

        let negotiated = device
            .set_format(&wanted)
            .with_context(|| format!("negotiate format on {}", self.config.device))?;
        if negotiated.fourcc != rgb24 {
            return Err(anyhow!(
                "{} cannot deliver RGB24 (driver offered {})",
                self.config.device,
                negotiated.fourcc
            ));
        }
        Ok((negotiated.width, negotiated.height))
    }

    /// Frame-rate requests are best-effort; a driver that ignores them
    /// still streams, just at its own pace.
    fn request_frame_rate(&self, device: &mut v4l::Device) {
        use v4l::video::Capture;

        if self.config.target_fps == 0 {
            return;
        }
        let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
        if device.set_params(&params).is_err() {
            log::debug!(
                "WebcamSource: {} ignored the {} fps request",
                self.config.device,
                self.config.target_fps
            );
        }
    }

    fn poll_frame(&mut self) -> Result<Option<VideoFrame>> {
        use v4l::io::traits::CaptureStream;

        if self.stopped {
            return Err(anyhow!("webcam source is stopped"));
        }
        let state = self.state.as_mut().context("camera device not connected")?;

        let (buf, _meta) = match state.with_mut(|fields| fields.stream.next()) {
            Ok(grabbed) => grabbed,
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(anyhow::Error::new(err).context("grab camera frame"));
            }
        };

        // Drivers may hand back short buffers before the stream settles;
        // treat those as the warmup wait state.
        let expected = rgb_len(self.active_width, self.active_height)?;
        if buf.len() < expected {
            return Ok(None);
        }

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        let frame = VideoFrame::new(
            buf[..expected].to_vec(),
            self.active_width,
            self.active_height,
        )?;
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("WebcamSource: released {}", self.config.device);
        }
        self.stopped = true;
    }

    /// Healthy means streaming without a recorded fault and, once frames
    /// have started, not stalled past [`STALL_AFTER`].
    fn is_healthy(&self) -> bool {
        !self.stopped
            && self.last_error.is_none()
            && self
                .last_frame_at
                .map_or(true, |at| at.elapsed() <= STALL_AFTER)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(device: &str) -> CaptureConfig {
        CaptureConfig {
            device: device.to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }

    #[test]
    fn source_warms_up_before_producing_frames() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://warmup:2"))?;
        source.connect()?;

        assert!(source.poll_frame()?.is_none());
        assert!(source.poll_frame()?.is_none());

        let frame = source.poll_frame()?.expect("frame after warmup");
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert_eq!(frame.byte_len(), 640 * 480 * 3);
        Ok(())
    }

    #[test]
    fn consecutive_frames_differ() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://warmup:0"))?;
        source.connect()?;

        let first = source.poll_frame()?.expect("first frame");
        let second = source.poll_frame()?.expect("second frame");
        assert_ne!(first.data, second.data);
        Ok(())
    }

    #[test]
    fn synthetic_frames_contain_a_moving_subject() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://warmup:0"))?;
        source.connect()?;

        let frame = source.poll_frame()?.expect("frame");
        // Backdrop and subject pixels both present.
        assert!(frame.data.chunks_exact(3).any(|px| px == [96, 96, 96]));
        assert!(frame.data.chunks_exact(3).any(|px| px == [208, 184, 148]));
        Ok(())
    }

    #[test]
    fn polling_before_connect_is_an_error() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://camera"))?;
        assert!(source.poll_frame().is_err());
        Ok(())
    }

    #[test]
    fn stop_releases_the_source() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://warmup:0"))?;
        source.connect()?;
        assert!(source.poll_frame()?.is_some());
        assert!(source.is_healthy());

        source.stop();
        assert!(!source.is_healthy());
        assert!(source.poll_frame().is_err());

        // stop is idempotent
        source.stop();
        Ok(())
    }

    #[test]
    fn stats_track_captured_frames() -> Result<()> {
        let mut source = WebcamSource::open(stub_config("stub://warmup:1"))?;
        source.connect()?;

        source.poll_frame()?; // warmup poll
        source.poll_frame()?;
        source.poll_frame()?;

        let stats = source.stats();
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.device, "stub://warmup:1");
        Ok(())
    }

    #[test]
    fn invalid_warmup_spec_is_rejected() {
        assert!(WebcamSource::open(stub_config("stub://warmup:abc")).is_err());
    }
}
