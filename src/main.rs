//! TimePlot - Main Entry Point
//!
//! Plots simulated devices sampled on background threads. An optional first
//! argument names the configuration file; otherwise `timeplot.json` in the
//! app data directory is used.

use anyhow::Context;
use std::path::PathBuf;
use timeplot_rs::config::{ensure_app_data_dir, AppConfig};
use timeplot_rs::frontend::TimePlotApp;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config_path = match std::env::args_os().nth(1) {
        Some(path) => Some(PathBuf::from(path)),
        None => AppConfig::default_path().ok(),
    };
    let config = match &config_path {
        Some(path) => AppConfig::load_or_default(path),
        None => AppConfig::sample(),
    };

    let _log_guard = init_logging(config.ui.log_to_file)?;

    tracing::info!("Starting TimePlot");
    tracing::info!("Configuration file: {:?}", config_path);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([800.0, 480.0])
            .with_title("TimePlot"),
        ..Default::default()
    };

    eframe::run_native(
        "TimePlot",
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(TimePlotApp::new(cc, config, config_path)?))
        }),
    )
    .map_err(|e| anyhow::anyhow!("UI terminated with an error: {}", e))?;

    tracing::info!("Bye");
    Ok(())
}

/// Install the global subscriber; the returned guard flushes the log file
fn init_logging(log_to_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,timeplot_rs=debug"));

    let (file_layer, guard) = if log_to_file {
        let dir = ensure_app_data_dir()
            .context("Failed to locate the log directory")?
            .join("logs");
        let appender = tracing_appender::rolling::daily(dir, "timeplot.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(guard)
}
