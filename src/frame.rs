//! Video frame container.
//!
//! Capture sources produce `VideoFrame` instances; the frame loop hands them
//! to the detector and blits them onto the overlay canvas. Pixels are packed
//! RGB24, row-major, no padding.

use anyhow::{anyhow, Result};

/// One decoded video frame (RGB24).
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    /// Create a frame, validating that the buffer matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Byte length of an RGB24 buffer for the given dimensions.
pub fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
