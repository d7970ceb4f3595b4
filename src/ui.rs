//! Terminal metrics panel.
//!
//! Renders the last metrics snapshot as meter bars plus per-class counts.
//! The meters clip at fixed scales (60 fps, 200 ms) purely for display; the
//! raw uncapped values always appear in the bar messages.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::metrics::MetricsSnapshot;

/// Visual scale of the FPS meter.
pub const FPS_METER_MAX: u64 = 60;
/// Visual scale of the inference latency meter, in milliseconds.
pub const LATENCY_METER_MAX_MS: u64 = 200;
/// Number of class-count entries shown.
const TOP_CLASSES: usize = 10;

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Dashboard panel.
///
/// Pretty mode draws persistent meter bars on stderr; plain mode prints one
/// summary line per render.
pub struct DashboardUi {
    mode: UiMode,
    is_tty: bool,
    panel: Option<Panel>,
}

struct Panel {
    // Keeps the draw state alive for the bars below.
    _multi: MultiProgress,
    fps: ProgressBar,
    latency: ProgressBar,
    counts: ProgressBar,
}

impl DashboardUi {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self {
            mode,
            is_tty,
            panel: None,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        match self.mode {
            UiMode::Pretty => true,
            UiMode::Auto => self.is_tty,
            UiMode::Plain => false,
        }
    }

    /// Draw one render of the panel.
    pub fn render(&mut self, snapshot: &MetricsSnapshot, counts: &[(String, usize)]) {
        if self.use_pretty() {
            let panel = self.panel.get_or_insert_with(Panel::new);
            panel
                .fps
                .set_position(meter_position(snapshot.fps as u64, FPS_METER_MAX));
            panel.fps.set_message(format!("{} fps", snapshot.fps));
            panel.latency.set_position(meter_position(
                snapshot.inference_time_ms.round() as u64,
                LATENCY_METER_MAX_MS,
            ));
            panel
                .latency
                .set_message(format!("{:.1} ms", snapshot.inference_time_ms));
            panel.counts.set_message(format!(
                "{} detections | {}",
                snapshot.total_detections,
                format_counts(counts)
            ));
        } else {
            eprintln!("{}", plain_line(snapshot, counts));
        }
    }

    /// Tear the bars down, leaving the last state on screen.
    pub fn finish(&mut self) {
        if let Some(panel) = self.panel.take() {
            panel.fps.abandon();
            panel.latency.abandon();
            panel.counts.abandon();
        }
    }
}

impl Panel {
    fn new() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let fps = multi.add(ProgressBar::new(FPS_METER_MAX));
        fps.set_style(bar_style("fps     [{bar:40.cyan}] {msg}"));

        let latency = multi.add(ProgressBar::new(LATENCY_METER_MAX_MS));
        latency.set_style(bar_style("latency [{bar:40.magenta}] {msg}"));

        let counts = multi.add(ProgressBar::new(1));
        counts.set_style(bar_style("classes {msg}"));

        Self {
            _multi: multi,
            fps,
            latency,
            counts,
        }
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Meter fill for a raw value; the clip is presentation-only.
fn meter_position(value: u64, max: u64) -> u64 {
    value.min(max)
}

fn format_counts(counts: &[(String, usize)]) -> String {
    if counts.is_empty() {
        return "none".to_string();
    }
    counts
        .iter()
        .take(TOP_CLASSES)
        .map(|(label, count)| format!("{label}:{count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn plain_line(snapshot: &MetricsSnapshot, counts: &[(String, usize)]) -> String {
    format!(
        "fps={} inference_ms={:.1} detections={} classes={}",
        snapshot.fps,
        snapshot.inference_time_ms,
        snapshot.total_detections,
        format_counts(counts)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_resolution_follows_flag_and_tty() {
        assert!(DashboardUi::from_args(Some("pretty"), false).use_pretty());
        assert!(!DashboardUi::from_args(Some("plain"), true).use_pretty());
        assert!(DashboardUi::from_args(None, true).use_pretty());
        assert!(!DashboardUi::from_args(None, false).use_pretty());
    }

    #[test]
    fn meter_clips_but_messages_keep_the_raw_value() {
        assert_eq!(meter_position(144, FPS_METER_MAX), 60);
        assert_eq!(meter_position(30, FPS_METER_MAX), 30);

        let snapshot = MetricsSnapshot {
            fps: 144,
            inference_time_ms: 412.6,
            total_detections: 2,
        };
        let line = plain_line(&snapshot, &[]);
        assert!(line.contains("fps=144"));
        assert!(line.contains("inference_ms=412.6"));
    }

    #[test]
    fn counts_are_truncated_to_the_top_ten() {
        let counts: Vec<(String, usize)> = (0..12)
            .map(|i| (format!("label{i}"), 12 - i))
            .collect();
        let rendered = format_counts(&counts);
        assert!(rendered.contains("label0:12"));
        assert!(rendered.contains("label9:3"));
        assert!(!rendered.contains("label10"));
        assert_eq!(format_counts(&[]), "none");
    }
}
