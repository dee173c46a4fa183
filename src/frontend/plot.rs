//! Plot rendering with egui_plot
//!
//! One [`Line`] per plotted line, x in seconds relative to the line's time
//! origin. In follow mode the x axis shows the newest `time_window` seconds
//! and the y axis is fitted to the visible points.

use crate::config::UiConfig;
use crate::session::TimePlotData;
use crate::types::LineId;
use egui::{Color32, Ui};
use egui_plot::{Corner, Legend, Line, Plot, PlotBounds, PlotPoints, PlotUi};
use std::collections::BTreeMap;

/// Line colors, assigned by line id
const PALETTE: [Color32; 8] = [
    Color32::from_rgb(31, 119, 180),
    Color32::from_rgb(255, 127, 14),
    Color32::from_rgb(44, 160, 44),
    Color32::from_rgb(214, 39, 40),
    Color32::from_rgb(148, 103, 189),
    Color32::from_rgb(140, 86, 75),
    Color32::from_rgb(227, 119, 194),
    Color32::from_rgb(23, 190, 207),
];

/// Color of a line
pub fn line_color(line_id: LineId) -> Color32 {
    PALETTE[line_id.0 as usize % PALETTE.len()]
}

/// Plot view configuration and state
#[derive(Debug, Clone)]
pub struct PlotView {
    pub show_legend: bool,
    pub show_grid: bool,
    pub line_width: f32,
    /// Seconds shown in follow mode
    pub time_window: f64,
    /// Keep the newest samples in view
    pub follow_latest: bool,
}

impl Default for PlotView {
    fn default() -> Self {
        Self::from_config(&UiConfig::default())
    }
}

impl PlotView {
    pub fn from_config(config: &UiConfig) -> Self {
        Self {
            show_legend: config.show_legend,
            show_grid: config.show_grid,
            line_width: config.line_width,
            time_window: config.time_window_seconds.max(MIN_TIME_WINDOW),
            follow_latest: config.follow_latest,
        }
    }

    /// Set the follow-mode window, at least [`MIN_TIME_WINDOW`] seconds
    pub fn set_time_window(&mut self, seconds: f64) {
        self.time_window = seconds.max(MIN_TIME_WINDOW);
    }

    /// Draw every line of `data`, labelled from `names`
    pub fn render(&mut self, ui: &mut Ui, data: &TimePlotData, names: &BTreeMap<LineId, String>) {
        let mut plot = Plot::new("timeplot")
            .allow_zoom(!self.follow_latest)
            .allow_drag(true)
            .allow_scroll(!self.follow_latest)
            .show_axes(true)
            .show_grid(self.show_grid)
            .x_axis_label("Time (s)")
            .y_axis_label("Value");

        if self.show_legend {
            plot = plot.legend(
                Legend::default()
                    .position(Corner::RightTop)
                    .background_alpha(0.8),
            );
        }

        let follow_window = if self.follow_latest {
            latest_time(data).map(|latest| {
                let x_min = (latest - self.time_window).max(0.0);
                let (y_min, y_max) = visible_y_range(data, x_min, latest);
                ([x_min, y_min], [latest.max(x_min + MIN_TIME_WINDOW), y_max])
            })
        } else {
            None
        };

        let response = plot.show(ui, |plot_ui| {
            if let Some((min, max)) = follow_window {
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(min, max));
            }
            self.render_lines(plot_ui, data, names);
        });

        // Dragging the plot leaves follow mode
        if response.response.dragged() && self.follow_latest {
            self.follow_latest = false;
        }
    }

    fn render_lines(&self, plot_ui: &mut PlotUi, data: &TimePlotData, names: &BTreeMap<LineId, String>) {
        for line_id in data.line_ids() {
            let Some(buffer) = data.buffer(line_id) else {
                continue;
            };
            let points: Vec<[f64; 2]> = buffer.points().filter(|p| p[1].is_finite()).collect();
            if points.is_empty() {
                continue;
            }

            let name = names
                .get(&line_id)
                .cloned()
                .unwrap_or_else(|| line_id.data_key());
            let line = Line::new(name, PlotPoints::from(points))
                .color(line_color(line_id))
                .width(self.line_width);
            plot_ui.line(line);
        }
    }
}

/// Smallest follow-mode window in seconds
pub const MIN_TIME_WINDOW: f64 = 0.1;

/// Newest relative time over all lines
fn latest_time(data: &TimePlotData) -> Option<f64> {
    data.line_ids()
        .into_iter()
        .filter_map(|id| data.buffer(id).and_then(|b| b.t().last().copied()))
        .reduce(f64::max)
}

/// Padded y range of the finite points with `x_min <= t <= x_max`
fn visible_y_range(data: &TimePlotData, x_min: f64, x_max: f64) -> (f64, f64) {
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for line_id in data.line_ids() {
        let Some(buffer) = data.buffer(line_id) else {
            continue;
        };
        for [t, y] in buffer.points() {
            if t >= x_min && t <= x_max && y.is_finite() {
                y_min = y_min.min(y);
                y_max = y_max.max(y);
            }
        }
    }

    if y_min <= y_max {
        let range = y_max - y_min;
        let padding = if range > 0.0 { range * 0.1 } else { 1.0 };
        (y_min - padding, y_max + padding)
    } else {
        (-1.0, 1.0)
    }
}
