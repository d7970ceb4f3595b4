//! visiondashd - live object-detection dashboard daemon
//!
//! This daemon:
//! 1. Loads configuration (JSON file + VISIONDASH_* env + CLI overrides)
//! 2. Activates a detection supervisor (camera + detector + frame loop)
//! 3. Renders the terminal metrics panel once per second
//! 4. Deactivates cleanly on ctrl-c or when --duration elapses

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use visiondash::{
    class_counts, DaemonConfig, DashboardUi, DetectionSupervisor, FilterHandle, SharedMetrics,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Camera device path or stub:// spec.
    #[arg(long)]
    camera: Option<String>,
    /// Model id: stub://<spec> or a path to an .onnx file.
    #[arg(long)]
    model: Option<String>,
    /// Execution mode: accelerated or software.
    #[arg(long)]
    device: Option<String>,
    /// Classes to select at startup (comma separated). Empty accepts all.
    #[arg(long)]
    classes: Option<String>,
    /// Stop after this many seconds (runs until ctrl-c by default).
    #[arg(long)]
    duration: Option<u64>,
    /// UI mode: auto, plain, pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = DaemonConfig::load()?;
    if let Some(camera) = args.camera {
        cfg.camera.device = camera;
    }
    if let Some(model) = args.model {
        cfg.model_id = model;
    }
    if let Some(device) = args.device.as_deref() {
        cfg.device = device.parse()?;
    }
    if let Some(classes) = args.classes.as_deref() {
        cfg.selected_classes = classes
            .split(',')
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
    }

    let filter = FilterHandle::default();
    for label in &cfg.selected_classes {
        filter.toggle(label);
    }
    let metrics = SharedMetrics::new();

    let mut supervisor = DetectionSupervisor::new(
        cfg.camera.clone(),
        cfg.model_id.clone(),
        cfg.device,
        filter,
        Arc::new(metrics.clone()),
    );

    if let Err(err) = supervisor.activate() {
        log::error!("{err}");
        return Err(anyhow!("activation failed: {err}"));
    }
    log::info!(
        "visiondashd running: camera={} model={} device={}",
        cfg.camera.device,
        cfg.model_id,
        cfg.device
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_flag.store(false, Ordering::SeqCst);
    })?;

    let mut ui = DashboardUi::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let deadline = args
        .duration
        .map(|seconds| Instant::now() + Duration::from_secs(seconds));

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        std::thread::sleep(Duration::from_secs(1));

        let snapshot = metrics.snapshot();
        let counts = class_counts(&metrics.last_detections());
        ui.render(&snapshot, &counts);
    }

    ui.finish();
    supervisor.deactivate();
    log::info!("visiondashd stopped");
    Ok(())
}
