//! Bounding-box overlay rendering.
//!
//! The canvas holds an RGB surface sized to the source frame. Each tick the
//! frame is blitted as the base layer, then every surviving detection gets a
//! stroked box and a label chip. Chips sit just above the box's top edge and
//! may clip off-surface for boxes near the top; that is accepted, drawing
//! never fails. Later detections may overdraw earlier chips.

mod font;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::VideoFrame;

/// Box stroke and chip fill color.
const ACCENT: Rgb<u8> = Rgb([6, 182, 212]);
/// Label text color.
const LABEL_INK: Rgb<u8> = Rgb([15, 23, 42]);

/// Box stroke width in pixels.
const STROKE_WIDTH: i32 = 3;
/// Label chip height; the chip top sits this far above the box top.
const CHIP_HEIGHT: i32 = 25;
/// Horizontal padding added around the measured label text.
const CHIP_PADDING: i32 = 10;
/// Label pen offset from the box corner: `(xmin + 5, ymin - 7)` baseline.
const LABEL_OFFSET_X: i32 = 5;
const LABEL_OFFSET_Y: i32 = 7;

/// Render surface for one activation cycle.
///
/// Owned by the frame loop's worker; recreated each cycle.
#[derive(Debug, Default)]
pub struct OverlayCanvas {
    image: RgbImage,
}

impl OverlayCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize the surface to the frame's native dimensions and blit the
    /// frame as the base layer, discarding the previous tick's contents.
    pub fn begin_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        self.image = RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match dimensions"))?;
        Ok(())
    }

    /// Draw boxes and label chips for each detection, in sequence order.
    pub fn draw_detections(&mut self, detections: &[Detection]) {
        for detection in detections {
            self.draw_detection(detection);
        }
    }

    fn draw_detection(&mut self, detection: &Detection) {
        if self.image.width() == 0 || self.image.height() == 0 {
            return;
        }
        let xmin = detection.bounds.xmin.round() as i32;
        let ymin = detection.bounds.ymin.round() as i32;
        let width = detection.bounds.width().round() as i32;
        let height = detection.bounds.height().round() as i32;

        // Stroke the box as nested 1px rectangles.
        for inset in 0..STROKE_WIDTH {
            let w = width - 2 * inset;
            let h = height - 2 * inset;
            if w < 1 || h < 1 {
                break;
            }
            let rect = Rect::at(xmin + inset, ymin + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.image, rect, ACCENT);
        }

        let text = label_text(detection);
        let chip_width = font::text_width(&text) as i32 + CHIP_PADDING;
        if chip_width > 0 {
            let chip = Rect::at(xmin, ymin - CHIP_HEIGHT).of_size(chip_width as u32, CHIP_HEIGHT as u32);
            if let Some(visible) = chip.intersect(Rect::at(0, 0).of_size(self.width(), self.height()))
            {
                draw_filled_rect_mut(&mut self.image, visible, ACCENT);
            }
        }
        font::draw_text(
            &mut self.image,
            &text,
            xmin + LABEL_OFFSET_X,
            ymin - LABEL_OFFSET_Y,
            LABEL_INK,
        );
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The rendered surface.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Chip text: label plus the score as a percentage with one decimal.
fn label_text(detection: &Detection) -> String {
    format!("{} {:.1}%", detection.label, detection.score * 100.0)
}
