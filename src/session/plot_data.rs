//! UI-thread consumer of pipeline events
//!
//! [`TimePlotData`] owns the [`LineBuffer`] of every line. It is only ever
//! touched from the UI thread: [`handle_event`](TimePlotData::handle_event)
//! appends a sample, autosaves when due, flags a redraw and then
//! acknowledges the sample so its producer may continue.

use super::buffer::{LineBuffer, LineSnapshot};
use super::store::DataStore;
use crate::backend::sampling::Sample;
use crate::config::PersistenceConfig;
use crate::error::{Result, TimePlotError};
use crate::pipeline::PipelineEvent;
use crate::types::{wall_clock_seconds, LineId};
use std::collections::BTreeMap;

#[derive(Debug)]
struct LineData {
    buffer: LineBuffer,
    fault: Option<String>,
}

/// Buffers of all lines plus their persistence
#[derive(Debug)]
pub struct TimePlotData {
    lines: BTreeMap<LineId, LineData>,
    store: Option<DataStore>,
    autosave_every: Option<usize>,
    recall_on_add: bool,
    redraw: bool,
}

impl TimePlotData {
    /// Create an empty consumer
    ///
    /// `store` is `None` when nothing should be persisted.
    pub fn new(store: Option<DataStore>, persistence: &PersistenceConfig) -> Self {
        Self {
            lines: BTreeMap::new(),
            store,
            autosave_every: persistence.autosave_cadence(),
            recall_on_add: persistence.recall_on_startup && !persistence.clear_on_startup,
            redraw: false,
        }
    }

    /// Register a line with an empty buffer, or its stored data when
    /// startup recall is enabled
    pub fn add_line(&mut self, line_id: LineId) {
        let mut data = LineData {
            buffer: LineBuffer::new(line_id, wall_clock_seconds()),
            fault: None,
        };

        if self.recall_on_add {
            if let Some(store) = &self.store {
                match store.recall_line(line_id) {
                    Ok(Some(snapshot)) => {
                        let points = snapshot.t.len();
                        match data.buffer.restore(snapshot) {
                            Ok(()) => tracing::info!(line = %line_id, points, "Recalled stored data"),
                            Err(e) => tracing::warn!(line = %line_id, "Ignoring stored data: {}", e),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(line = %line_id, "Failed to recall stored data: {}", e),
                }
            }
        }

        self.lines.insert(line_id, data);
        self.redraw = true;
    }

    pub fn remove_line(&mut self, line_id: LineId) -> bool {
        self.redraw = true;
        self.lines.remove(&line_id).is_some()
    }

    pub fn line_ids(&self) -> Vec<LineId> {
        self.lines.keys().copied().collect()
    }

    pub fn buffer(&self, line_id: LineId) -> Option<&LineBuffer> {
        self.lines.get(&line_id).map(|d| &d.buffer)
    }

    /// Turn autosave on or off; the cadence is clamped to 10..=1000 points
    pub fn set_autosave(&mut self, enabled: bool, every: usize) {
        let mut persistence = PersistenceConfig {
            autosave: enabled,
            ..PersistenceConfig::default()
        };
        persistence.set_autosave_every(every);
        self.autosave_every = persistence.autosave_cadence();
    }

    pub fn autosave_every(&self) -> Option<usize> {
        self.autosave_every
    }

    /// Consume one pipeline event
    pub fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Sample(sample) => self.on_sample(sample),
            PipelineEvent::Fault { line_id, error } => self.on_fault(line_id, error),
        }
    }

    /// Append a sample, autosave if due, flag a redraw, then acknowledge
    ///
    /// A sample whose producer already timed out on it is skipped.
    pub fn on_sample(&mut self, sample: Sample) {
        let Sample {
            line_id,
            value,
            timestamp,
            ack,
        } = sample;

        let Some(data) = self.lines.get_mut(&line_id) else {
            tracing::warn!(line = %line_id, "Sample for unknown line dropped");
            ack.acknowledge();
            return;
        };

        // The producer already gave up on this sample and reported a stall
        if !ack.is_current() {
            tracing::debug!(line = %line_id, seq = ack.sequence(), "Skipping stale sample");
            return;
        }

        data.buffer.append(value, timestamp);
        data.fault = None;

        if let (Some(every), Some(store)) = (self.autosave_every, &self.store) {
            if data.buffer.len() % every == 0 {
                if let Err(e) = store.store_line(line_id, &data.buffer.snapshot()) {
                    tracing::warn!(line = %line_id, "Autosave failed: {}", e);
                }
            }
        }

        self.redraw = true;
        ack.acknowledge();
    }

    fn on_fault(&mut self, line_id: LineId, error: TimePlotError) {
        tracing::debug!(line = %line_id, "Line fault: {}", error);
        if let Some(data) = self.lines.get_mut(&line_id) {
            data.fault = Some(error.to_string());
            self.redraw = true;
        }
    }

    /// Last fault of a line, cleared by its next sample
    pub fn fault(&self, line_id: LineId) -> Option<&str> {
        self.lines.get(&line_id).and_then(|d| d.fault.as_deref())
    }

    pub fn latest_value(&self, line_id: LineId) -> Option<f64> {
        self.lines.get(&line_id).and_then(|d| d.buffer.last_value())
    }

    /// Empty a line and reset its time origin to now
    ///
    /// Intended for stopped or paused lines; a sample acknowledged right
    /// after is stamped relative to the new origin.
    pub fn clear_line(&mut self, line_id: LineId) -> Result<()> {
        let data = self
            .lines
            .get_mut(&line_id)
            .ok_or(TimePlotError::UnknownLine(line_id))?;
        data.buffer.clear(wall_clock_seconds());
        data.fault = None;
        self.redraw = true;
        Ok(())
    }

    pub fn clear_all(&mut self) {
        let now = wall_clock_seconds();
        for data in self.lines.values_mut() {
            data.buffer.clear(now);
            data.fault = None;
        }
        self.redraw = true;
    }

    pub fn snapshot(&self, line_id: LineId) -> Option<LineSnapshot> {
        self.buffer(line_id).map(LineBuffer::snapshot)
    }

    pub fn set_snapshot(&mut self, line_id: LineId, snapshot: LineSnapshot) -> Result<()> {
        let data = self
            .lines
            .get_mut(&line_id)
            .ok_or(TimePlotError::UnknownLine(line_id))?;
        data.buffer.restore(snapshot)?;
        self.redraw = true;
        Ok(())
    }

    /// Whether a data file is configured
    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn require_store(&self) -> Result<&DataStore> {
        self.store
            .as_ref()
            .ok_or_else(|| TimePlotError::Config("no data file configured".to_string()))
    }

    /// Persist one line
    pub fn store_line(&self, line_id: LineId) -> Result<()> {
        let snapshot = self
            .snapshot(line_id)
            .ok_or(TimePlotError::UnknownLine(line_id))?;
        self.require_store()?.store_line(line_id, &snapshot)
    }

    /// Persist every line in one write
    pub fn store_all(&self) -> Result<()> {
        let snapshots: Vec<(LineId, LineSnapshot)> = self
            .lines
            .iter()
            .map(|(id, d)| (*id, d.buffer.snapshot()))
            .collect();
        self.require_store()?
            .store_lines(snapshots.iter().map(|(id, s)| (*id, s)))?;
        tracing::info!(lines = snapshots.len(), "Stored all line data");
        Ok(())
    }

    /// Replace a line with its stored data; returns whether any was found
    pub fn recall_line(&mut self, line_id: LineId) -> Result<bool> {
        if !self.lines.contains_key(&line_id) {
            return Err(TimePlotError::UnknownLine(line_id));
        }
        match self.require_store()?.recall_line(line_id)? {
            Some(snapshot) => {
                self.set_snapshot(line_id, snapshot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Recall every line; returns how many had stored data
    pub fn recall_all(&mut self) -> Result<usize> {
        let mut recalled = 0;
        for line_id in self.line_ids() {
            if self.recall_line(line_id)? {
                recalled += 1;
            }
        }
        Ok(recalled)
    }

    /// Whether anything changed since the last call
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_recall() -> PersistenceConfig {
        PersistenceConfig {
            recall_on_startup: false,
            ..PersistenceConfig::default()
        }
    }

    fn fault(line_id: LineId) -> PipelineEvent {
        PipelineEvent::Fault {
            line_id,
            error: TimePlotError::Device("offline".to_string()),
        }
    }

    #[test]
    fn test_on_sample_appends_relative_time() {
        let mut data = TimePlotData::new(None, &no_recall());
        data.add_line(LineId(0));
        let origin = data.buffer(LineId(0)).unwrap().absolute_time();
        data.take_redraw();

        data.handle_event(PipelineEvent::Sample(Sample::detached(LineId(0), 0.5, origin + 2.0)));

        let buffer = data.buffer(LineId(0)).unwrap();
        assert_eq!(buffer.y(), &[0.5]);
        assert!((buffer.t()[0] - 2.0).abs() < 1e-9);
        assert!(data.take_redraw());
    }

    #[test]
    fn test_autosave_every_n_points() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path().join("data.json"));
        let mut data = TimePlotData::new(Some(store.clone()), &no_recall());
        data.set_autosave(true, 10);
        data.add_line(LineId(0));

        for i in 0..9 {
            data.on_sample(Sample::detached(LineId(0), i as f64, wall_clock_seconds()));
        }
        assert_eq!(store.recall_line(LineId(0)).unwrap(), None);

        data.on_sample(Sample::detached(LineId(0), 9.0, wall_clock_seconds()));
        let stored = store.recall_line(LineId(0)).unwrap().unwrap();
        assert_eq!(stored.y.len(), 10);
        assert_eq!(stored.y[9], 9.0);
    }

    #[test]
    fn test_fault_state_cleared_by_clear() {
        let mut data = TimePlotData::new(None, &no_recall());
        data.add_line(LineId(0));
        assert!(data.take_redraw());

        data.handle_event(fault(LineId(0)));
        assert!(data.fault(LineId(0)).unwrap().contains("offline"));
        assert!(data.take_redraw());
        assert!(!data.take_redraw());

        data.clear_line(LineId(0)).unwrap();
        assert_eq!(data.fault(LineId(0)), None);
    }

    #[test]
    fn test_unknown_line_operations() {
        let mut data = TimePlotData::new(None, &no_recall());
        assert!(matches!(
            data.clear_line(LineId(4)),
            Err(TimePlotError::UnknownLine(_))
        ));
        assert!(data.store_line(LineId(4)).is_err());
        data.handle_event(fault(LineId(4)));
        assert!(!data.take_redraw());
    }

    #[test]
    fn test_store_requires_data_file() {
        let mut data = TimePlotData::new(None, &no_recall());
        data.add_line(LineId(0));
        assert!(matches!(data.store_line(LineId(0)), Err(TimePlotError::Config(_))));
    }

    #[test]
    fn test_recall_on_add() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path().join("data.json"));
        let stored = LineSnapshot {
            t: vec![0.0, 1.0],
            y: vec![5.0, 6.0],
            absolute_time: 123.0,
        };
        store.store_line(LineId(1), &stored).unwrap();

        let mut data = TimePlotData::new(Some(store.clone()), &PersistenceConfig::default());
        data.add_line(LineId(1));
        assert_eq!(data.snapshot(LineId(1)), Some(stored));
        assert_eq!(data.latest_value(LineId(1)), Some(6.0));

        let clear_first = PersistenceConfig {
            clear_on_startup: true,
            ..PersistenceConfig::default()
        };
        let mut data = TimePlotData::new(Some(store), &clear_first);
        data.add_line(LineId(1));
        assert!(data.buffer(LineId(1)).unwrap().is_empty());
    }

    #[test]
    fn test_store_all_and_recall_all() {
        let dir = tempdir().unwrap();
        let store = DataStore::new(dir.path().join("data.json"));
        let mut data = TimePlotData::new(Some(store.clone()), &no_recall());
        data.add_line(LineId(0));
        data.add_line(LineId(1));
        data.set_snapshot(
            LineId(0),
            LineSnapshot {
                t: vec![0.5],
                y: vec![1.0],
                absolute_time: 7.0,
            },
        )
        .unwrap();
        data.store_all().unwrap();

        data.clear_all();
        assert_eq!(data.recall_all().unwrap(), 2);
        assert_eq!(data.snapshot(LineId(0)).unwrap().y, vec![1.0]);
        assert!(data.snapshot(LineId(1)).unwrap().y.is_empty());
    }

    #[test]
    fn test_set_autosave_clamps() {
        let mut data = TimePlotData::new(None, &no_recall());
        data.set_autosave(true, 2);
        assert_eq!(data.autosave_every(), Some(10));
        data.set_autosave(false, 50);
        assert_eq!(data.autosave_every(), None);
    }
}
