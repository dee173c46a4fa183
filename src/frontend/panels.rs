//! Panel components: toolbar, per-line controls and the status bar

use super::plot::{line_color, PlotView};
use super::state::{AppAction, LineView};
use crate::config::AUTOSAVE_EVERY_RANGE;
use crate::session::TimePlotData;
use crate::types::{LineStats, SamplingState};
use egui::{Color32, RichText, Ui};

/// Toolbar inputs owned by the app
pub struct ToolbarContext<'a> {
    pub plot: &'a mut PlotView,
    pub autosave_enabled: &'a mut bool,
    pub autosave_every: &'a mut usize,
    pub has_store: bool,
}

/// Controls acting on every line, plus plot and autosave settings
pub fn render_toolbar(ui: &mut Ui, ctx: ToolbarContext<'_>) -> Vec<AppAction> {
    let mut actions = Vec::new();

    ui.horizontal(|ui| {
        if ui.button("▶ Start all").clicked() {
            actions.push(AppAction::StartAll);
        }
        if ui.button("⏸ Pause all").clicked() {
            actions.push(AppAction::PauseAll);
        }
        if ui.button("⏵ Restart all").clicked() {
            actions.push(AppAction::RestartAll);
        }
        if ui.button("⏹ Stop all").clicked() {
            actions.push(AppAction::StopAll);
        }
        if ui.button("🗑 Clear all").clicked() {
            actions.push(AppAction::ClearAll);
        }

        ui.separator();

        ui.add_enabled_ui(ctx.has_store, |ui| {
            if ui.button("💾 Store").clicked() {
                actions.push(AppAction::StoreAll);
            }
            if ui.button("📂 Recall").clicked() {
                actions.push(AppAction::RecallAll);
            }

            let mut changed = ui.checkbox(&mut *ctx.autosave_enabled, "Autosave every").changed();
            changed |= ui
                .add_enabled(
                    *ctx.autosave_enabled,
                    egui::DragValue::new(&mut *ctx.autosave_every)
                        .range(AUTOSAVE_EVERY_RANGE)
                        .suffix(" points"),
                )
                .changed();
            if changed {
                actions.push(AppAction::SetAutosave {
                    enabled: *ctx.autosave_enabled,
                    every: *ctx.autosave_every,
                });
            }
        });

        ui.separator();

        ui.checkbox(&mut ctx.plot.follow_latest, "Follow latest");
        let mut window = ctx.plot.time_window;
        if ui
            .add(
                egui::DragValue::new(&mut window)
                    .range(0.1..=3600.0)
                    .speed(0.5)
                    .suffix(" s"),
            )
            .changed()
        {
            ctx.plot.set_time_window(window);
        }
        ui.checkbox(&mut ctx.plot.show_grid, "Grid");
        ui.checkbox(&mut ctx.plot.show_legend, "Legend");
    });

    actions
}

/// Color and text for a sampling state
pub fn state_label(state: SamplingState) -> (Color32, &'static str) {
    match state {
        SamplingState::Idle => (Color32::GRAY, "○ Idle"),
        SamplingState::Running => (Color32::GREEN, "● Running"),
        SamplingState::Paused => (Color32::YELLOW, "⏸ Paused"),
        SamplingState::Stopped => (Color32::GRAY, "○ Stopped"),
    }
}

/// One row of controls for a line
pub fn render_line_row(
    ui: &mut Ui,
    view: &mut LineView,
    state: SamplingState,
    stats: LineStats,
    data: &TimePlotData,
) -> Vec<AppAction> {
    let mut actions = Vec::new();
    let id = view.line_id;

    ui.horizontal(|ui| {
        ui.colored_label(line_color(id), "●");
        ui.label(RichText::new(&view.name).strong());

        let (color, text) = state_label(state);
        ui.colored_label(color, text);
    });

    ui.horizontal(|ui| {
        let active = state.is_active();
        if ui.add_enabled(!active, egui::Button::new("▶ Start")).clicked() {
            actions.push(AppAction::StartLine(id));
        }
        if ui
            .add_enabled(state == SamplingState::Running, egui::Button::new("⏸ Pause"))
            .clicked()
        {
            actions.push(AppAction::PauseLine(id));
        }
        if ui
            .add_enabled(state == SamplingState::Paused, egui::Button::new("⏵ Restart"))
            .clicked()
        {
            actions.push(AppAction::RestartLine(id));
        }
        if ui.add_enabled(active, egui::Button::new("⏹ Stop")).clicked() {
            actions.push(AppAction::StopLine(id));
        }
        if ui.button("🗑 Clear").clicked() {
            actions.push(AppAction::ClearLine(id));
        }
    });

    ui.horizontal(|ui| {
        ui.label("Frequency:");
        let response = ui.add(
            egui::DragValue::new(&mut view.frequency)
                .range(0.0..=100.0)
                .speed(0.01)
                .suffix(" Hz"),
        );
        if response.changed() {
            actions.push(AppAction::SetFrequency {
                line_id: id,
                frequency: view.frequency,
            });
        }
        if view.pending.is_some() {
            ui.spinner();
        }
    });

    ui.horizontal(|ui| {
        let value_text = match data.latest_value(id) {
            Some(v) if v.is_finite() => format!("{:.4}", v),
            Some(_) => "NaN".to_string(),
            None => "---".to_string(),
        };
        ui.label("Value:");
        ui.label(RichText::new(value_text).monospace());

        let points = data.buffer(id).map_or(0, |b| b.len());
        ui.label(RichText::new(format!("{} pts", points)).small());
    });

    if stats.stalls > 0 || stats.dropped > 0 {
        ui.label(
            RichText::new(format!("stalls: {}  dropped: {}", stats.stalls, stats.dropped))
                .small()
                .color(Color32::LIGHT_RED),
        );
    }

    if let Some(fault) = data.fault(id) {
        ui.colored_label(Color32::RED, format!("⚠ {}", fault));
    }

    actions
}

/// Bottom bar with the last error, if any
pub fn render_status_bar(ui: &mut Ui, last_error: &mut Option<String>) {
    ui.horizontal(|ui| {
        let dismissed = match last_error.as_deref() {
            Some(error) => {
                ui.colored_label(Color32::RED, format!("⚠ {}", error));
                ui.small_button("✕").clicked()
            }
            None => {
                ui.label(RichText::new("Ready").small());
                false
            }
        };
        if dismissed {
            *last_error = None;
        }
    });
}
