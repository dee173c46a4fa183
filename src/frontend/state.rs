//! Action and view-state types for the frontend
//!
//! Panels never touch the pipeline directly. They read the current state,
//! return [`AppAction`]s, and the app applies them after the frame's layout
//! is done.

use crate::backend::device_proxy::Reply;
use crate::types::LineId;

/// Actions the panels can emit
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    StartLine(LineId),
    StopLine(LineId),
    PauseLine(LineId),
    RestartLine(LineId),
    ClearLine(LineId),
    StoreLine(LineId),
    RecallLine(LineId),
    /// Forward a new frequency to the line's device
    SetFrequency {
        line_id: LineId,
        frequency: f64,
    },
    StartAll,
    StopAll,
    PauseAll,
    RestartAll,
    ClearAll,
    StoreAll,
    RecallAll,
    SetAutosave {
        enabled: bool,
        every: usize,
    },
}

/// UI-side state of one line
#[derive(Debug)]
pub struct LineView {
    pub line_id: LineId,
    pub name: String,
    /// Frequency shown in the editor
    pub frequency: f64,
    /// Reply of the last device call that has not arrived yet
    pub pending: Option<(String, Reply)>,
}

impl LineView {
    pub fn new(line_id: LineId, name: impl Into<String>, frequency: f64) -> Self {
        Self {
            line_id,
            name: name.into(),
            frequency,
            pending: None,
        }
    }
}
