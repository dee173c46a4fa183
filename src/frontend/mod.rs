//! Frontend module for the egui UI
//!
//! A thin eframe application over a [`TimePlotPipeline`] and the
//! [`TimePlotData`] it feeds. Every frame it drains the pipeline's events
//! into the line buffers (acknowledging each sample), renders the controls
//! and the plot, and applies the [`AppAction`]s the panels returned.
//!
//! The pipeline wakes the UI through `request_repaint`, so an idle window
//! still picks up samples promptly.
//!
//! # Submodules
//!
//! - `panels` - toolbar, per-line controls, status bar
//! - `plot` - egui_plot rendering
//! - `state` - actions and per-line view state

pub mod panels;
mod plot;
pub mod state;

pub use plot::{line_color, PlotView};
pub use state::{AppAction, LineView};

use crate::backend::task::TaskArgs;
use crate::config::AppConfig;
use crate::error::{Result, TimePlotError};
use crate::pipeline::{TimePlotPipeline, Waker};
use crate::session::{DataStore, TimePlotData};
use crate::types::LineId;
use crossbeam_channel::TryRecvError;
use panels::ToolbarContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Main application state
pub struct TimePlotApp {
    pipeline: TimePlotPipeline,
    data: TimePlotData,
    lines: Vec<LineView>,
    plot: PlotView,
    config: AppConfig,
    config_path: Option<PathBuf>,
    autosave_enabled: bool,
    autosave_every: usize,
    last_error: Option<String>,
}

impl TimePlotApp {
    /// Build the app for an eframe window
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let ctx = cc.egui_ctx.clone();
        let waker: Waker = Arc::new(move || ctx.request_repaint());
        Self::build(config, config_path, Some(waker))
    }

    /// Build the app without a window; `waker` is called after every event
    pub fn build(
        config: AppConfig,
        config_path: Option<PathBuf>,
        waker: Option<Waker>,
    ) -> Result<Self> {
        let mut pipeline = match waker {
            Some(waker) => TimePlotPipeline::with_waker(config.sampling.clone(), waker),
            None => TimePlotPipeline::new(config.sampling.clone()),
        };

        let store = match config.persistence.data_path() {
            Ok(path) => {
                tracing::info!("Line data file: {:?}", path);
                Some(DataStore::new(path))
            }
            Err(e) => {
                tracing::warn!("Line data will not be persisted: {}", e);
                None
            }
        };
        let mut data = TimePlotData::new(store, &config.persistence);

        let mut lines = Vec::with_capacity(config.lines.len());
        for line in &config.lines {
            let line_id = pipeline.add_line(line.device.build(&line.name))?;
            data.add_line(line_id);
            lines.push(LineView::new(line_id, &line.name, line.device.frequency));
        }
        tracing::info!(lines = lines.len(), "Plot lines created");

        if config.ui.start_on_launch {
            pipeline.start_all()?;
        }

        Ok(Self {
            pipeline,
            data,
            lines,
            plot: PlotView::from_config(&config.ui),
            autosave_enabled: config.persistence.autosave,
            autosave_every: config.persistence.autosave_every,
            config,
            config_path,
            last_error: None,
        })
    }

    pub fn pipeline(&self) -> &TimePlotPipeline {
        &self.pipeline
    }

    pub fn data(&self) -> &TimePlotData {
        &self.data
    }

    pub fn lines(&self) -> &[LineView] {
        &self.lines
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Move every queued pipeline event into the line buffers
    pub fn process_events(&mut self) -> usize {
        let events = self.pipeline.drain_events();
        let count = events.len();
        for event in events {
            self.data.handle_event(event);
        }
        count
    }

    /// Collect replies of device calls that have completed
    pub fn poll_replies(&mut self) {
        for view in &mut self.lines {
            let Some((member, reply)) = &view.pending else {
                continue;
            };
            let outcome = match reply.try_recv() {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(format!("{}: {}", member, e)),
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => {
                    Some(format!("{}: call dropped before it ran", member))
                }
            };
            if let Some(error) = outcome {
                tracing::warn!(line = %view.line_id, "{}", error);
                self.last_error = Some(error);
            }
            view.pending = None;
        }
    }

    fn has_pending_calls(&self) -> bool {
        self.lines.iter().any(|v| v.pending.is_some())
    }

    /// Apply an action, reporting a failure in the status bar
    pub fn apply_action(&mut self, action: AppAction) {
        tracing::debug!("Applying {:?}", action);
        if let Err(e) = self.handle_action(action) {
            tracing::warn!("{}", e);
            self.last_error = Some(e.to_string());
        }
    }

    fn handle_action(&mut self, action: AppAction) -> Result<()> {
        match action {
            AppAction::StartLine(id) => self.pipeline.start(id),
            AppAction::StopLine(id) => self.pipeline.stop(id),
            AppAction::PauseLine(id) => self.pipeline.pause(id),
            AppAction::RestartLine(id) => self.pipeline.restart(id),
            AppAction::ClearLine(id) => self.data.clear_line(id),
            AppAction::StoreLine(id) => self.data.store_line(id),
            AppAction::RecallLine(id) => self.data.recall_line(id).map(|_| ()),
            AppAction::SetFrequency { line_id, frequency } => {
                self.set_frequency(line_id, frequency)
            }
            AppAction::StartAll => self.pipeline.start_all(),
            AppAction::StopAll => self.pipeline.stop_all(),
            AppAction::PauseAll => self.pipeline.pause_all(),
            AppAction::RestartAll => self.pipeline.restart_all(),
            AppAction::ClearAll => {
                self.data.clear_all();
                Ok(())
            }
            AppAction::StoreAll => self.data.store_all(),
            AppAction::RecallAll => {
                let recalled = self.data.recall_all()?;
                tracing::info!(lines = recalled, "Recalled stored line data");
                Ok(())
            }
            AppAction::SetAutosave { enabled, every } => {
                self.data.set_autosave(enabled, every);
                self.config.persistence.autosave = enabled;
                self.config.persistence.set_autosave_every(every);
                self.autosave_enabled = enabled;
                self.autosave_every = self.config.persistence.autosave_every;
                Ok(())
            }
        }
    }

    /// Forward a frequency to the device without blocking the UI thread
    fn set_frequency(&mut self, line_id: LineId, frequency: f64) -> Result<()> {
        let proxy = self
            .pipeline
            .proxy(line_id)
            .ok_or(TimePlotError::UnknownLine(line_id))?;
        let reply = proxy
            .member("set_frequency")?
            .submit(TaskArgs::positional([Value::from(frequency)]))?;

        if let Some(view) = self.lines.iter_mut().find(|v| v.line_id == line_id) {
            view.frequency = frequency;
            view.pending = Some(("set_frequency".to_string(), reply));
        }
        if let Some(line) = self.config.lines.get_mut(line_id.0 as usize) {
            line.device.frequency = frequency;
        }
        Ok(())
    }

    /// Stop sampling, store data and settings
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        if let Err(e) = self.pipeline.stop_all() {
            tracing::warn!("Failed to stop sampling: {}", e);
        }
        self.process_events();

        if self.data.autosave_every().is_some() {
            if let Err(e) = self.data.store_all() {
                tracing::warn!("Failed to store line data: {}", e);
            }
        }

        self.config.ui.follow_latest = self.plot.follow_latest;
        self.config.ui.time_window_seconds = self.plot.time_window;
        self.config.ui.show_grid = self.plot.show_grid;
        self.config.ui.show_legend = self.plot.show_legend;
        if let Some(path) = &self.config_path {
            if let Err(e) = self.config.save(path) {
                tracing::warn!("Failed to save config: {}", e);
            }
        }
    }
}

impl eframe::App for TimePlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_events();
        self.poll_replies();

        let mut actions = Vec::new();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            actions.extend(panels::render_toolbar(
                ui,
                ToolbarContext {
                    plot: &mut self.plot,
                    autosave_enabled: &mut self.autosave_enabled,
                    autosave_every: &mut self.autosave_every,
                    has_store: self.data.has_store(),
                },
            ));
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            panels::render_status_bar(ui, &mut self.last_error);
        });

        egui::SidePanel::left("lines")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for view in &mut self.lines {
                        let state = self.pipeline.state(view.line_id).unwrap_or_default();
                        let stats = self.pipeline.stats(view.line_id).unwrap_or_default();
                        actions.extend(panels::render_line_row(ui, view, state, stats, &self.data));
                        ui.separator();
                    }
                });
            });

        let names: BTreeMap<LineId, String> = self
            .lines
            .iter()
            .map(|v| (v.line_id, v.name.clone()))
            .collect();
        egui::CentralPanel::default().show(ctx, |ui| {
            self.plot.render(ui, &self.data, &names);
        });

        for action in actions {
            self.apply_action(action);
        }

        if self.data.take_redraw() || self.has_pending_calls() {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy_device::SignalForm;
    use crate::config::{DeviceConfig, LineConfig};
    use crate::types::SamplingState;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.persistence.data_file = Some(dir.join("data.json"));
        config.lines = vec![
            LineConfig::new(
                "sin",
                DeviceConfig {
                    signal_form: SignalForm::Sin,
                    ..DeviceConfig::default()
                },
            ),
            LineConfig::new("sawtooth", DeviceConfig::default()),
        ];
        config
    }

    fn pump_until(app: &mut TimePlotApp, mut done: impl FnMut(&TimePlotApp) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(app) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            app.process_events();
            app.poll_replies();
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_build_creates_one_line_per_config_entry() {
        let dir = tempdir().unwrap();
        let app = TimePlotApp::build(test_config(dir.path()), None, None).unwrap();

        assert_eq!(app.lines().len(), 2);
        assert_eq!(app.pipeline().line_ids(), vec![LineId(0), LineId(1)]);
        assert_eq!(app.data().line_ids(), vec![LineId(0), LineId(1)]);
        assert_eq!(app.lines()[0].name, "sin");
        assert_eq!(app.pipeline().state(LineId(0)), Some(SamplingState::Idle));
    }

    #[test]
    fn test_start_line_fills_its_buffer() {
        let dir = tempdir().unwrap();
        let mut app = TimePlotApp::build(test_config(dir.path()), None, None).unwrap();

        app.apply_action(AppAction::StartLine(LineId(0)));
        pump_until(&mut app, |app| {
            app.data().buffer(LineId(0)).map_or(0, |b| b.len()) >= 5
        });

        assert!(app.data().buffer(LineId(1)).unwrap().is_empty());
        app.apply_action(AppAction::StopLine(LineId(0)));
        assert_eq!(app.pipeline().state(LineId(0)), Some(SamplingState::Stopped));
        assert!(app.last_error().is_none());
    }

    #[test]
    fn test_lifecycle_error_is_reported() {
        let dir = tempdir().unwrap();
        let mut app = TimePlotApp::build(test_config(dir.path()), None, None).unwrap();

        app.apply_action(AppAction::PauseLine(LineId(1)));
        assert!(app.last_error().is_some());
    }

    #[test]
    fn test_set_frequency_reaches_device() {
        let dir = tempdir().unwrap();
        let mut app = TimePlotApp::build(test_config(dir.path()), None, None).unwrap();

        app.apply_action(AppAction::StartLine(LineId(0)));
        app.apply_action(AppAction::SetFrequency {
            line_id: LineId(0),
            frequency: 2.5,
        });
        pump_until(&mut app, |app| app.lines()[0].pending.is_none());

        app.apply_action(AppAction::StopLine(LineId(0)));
        let proxy = app.pipeline().proxy(LineId(0)).unwrap();
        let frequency = proxy.member("frequency").unwrap().value().unwrap();
        assert_eq!(frequency, 2.5);
        assert_eq!(app.lines()[0].frequency, 2.5);
        assert!(app.last_error().is_none());
    }

    #[test]
    fn test_store_and_recall_actions() {
        let dir = tempdir().unwrap();
        let mut app = TimePlotApp::build(test_config(dir.path()), None, None).unwrap();

        app.apply_action(AppAction::StartLine(LineId(1)));
        pump_until(&mut app, |app| {
            app.data().buffer(LineId(1)).map_or(0, |b| b.len()) >= 3
        });
        app.apply_action(AppAction::StopLine(LineId(1)));
        app.process_events();
        let stored = app.data().snapshot(LineId(1)).unwrap();

        app.apply_action(AppAction::StoreAll);
        app.apply_action(AppAction::ClearAll);
        assert!(app.data().buffer(LineId(1)).unwrap().is_empty());

        app.apply_action(AppAction::RecallAll);
        assert_eq!(app.data().snapshot(LineId(1)).unwrap(), stored);
        assert!(app.last_error().is_none());
    }

    #[test]
    fn test_shutdown_saves_config() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("timeplot.json");
        let mut app = TimePlotApp::build(
            test_config(dir.path()),
            Some(config_path.clone()),
            None,
        )
        .unwrap();

        app.apply_action(AppAction::SetAutosave {
            enabled: false,
            every: 5,
        });
        app.shutdown();

        let saved = AppConfig::load(&config_path).unwrap();
        assert!(!saved.persistence.autosave);
        assert_eq!(saved.persistence.autosave_every, 10);
        assert_eq!(saved.lines.len(), 2);
    }
}
