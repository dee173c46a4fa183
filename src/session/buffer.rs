//! Per-line data buffer
//!
//! A [`LineBuffer`] holds `(relative time, value)` pairs for one line. Times
//! are stored relative to the buffer's `absolute_time` origin (wall-clock
//! seconds since the Unix epoch), which is reset whenever the buffer is
//! cleared.

use crate::error::{Result, TimePlotError};
use crate::types::LineId;
use serde::{Deserialize, Deserializer, Serialize};

/// The full contents of a buffer, as persisted
///
/// Serialized as `{"t": [...], "y": [...], "absolute_time": ...}`.
/// Non-finite values are written as `null` and read back as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    #[serde(deserialize_with = "nullable_f64_vec")]
    pub t: Vec<f64>,
    #[serde(deserialize_with = "nullable_f64_vec")]
    pub y: Vec<f64>,
    #[serde(deserialize_with = "nullable_f64")]
    pub absolute_time: f64,
}

fn nullable_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

fn nullable_f64_vec<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<f64>, D::Error> {
    let values = Vec::<Option<f64>>::deserialize(deserializer)?;
    Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Append-only store of `(relative time, value)` pairs for one line
#[derive(Debug, Clone)]
pub struct LineBuffer {
    line_id: LineId,
    t: Vec<f64>,
    y: Vec<f64>,
    absolute_time: f64,
}

impl LineBuffer {
    /// Empty buffer whose time origin is `absolute_time`
    pub fn new(line_id: LineId, absolute_time: f64) -> Self {
        Self {
            line_id,
            t: Vec::new(),
            y: Vec::new(),
            absolute_time,
        }
    }

    pub fn line_id(&self) -> LineId {
        self.line_id
    }

    /// Append a reading taken at `wall_time`; returns its relative time
    ///
    /// A wall clock that stepped backwards is clamped to the previous
    /// relative time, so `t` never decreases.
    pub fn append(&mut self, value: f64, wall_time: f64) -> f64 {
        let mut relative = wall_time - self.absolute_time;
        if let Some(&last) = self.t.last() {
            if relative < last {
                tracing::debug!(
                    line = %self.line_id,
                    "Clock stepped back by {:.6}s, clamping",
                    last - relative
                );
                relative = last;
            }
        }
        self.t.push(relative);
        self.y.push(value);
        relative
    }

    /// Drop all points and move the time origin to `now`
    pub fn clear(&mut self, now: f64) {
        self.t.clear();
        self.y.clear();
        self.absolute_time = now;
    }

    /// Replace the contents
    pub fn set_data(&mut self, t: Vec<f64>, y: Vec<f64>, absolute_time: f64) -> Result<()> {
        if t.len() != y.len() {
            return Err(TimePlotError::InvalidData(format!(
                "line {}: {} time values but {} data values",
                self.line_id,
                t.len(),
                y.len()
            )));
        }
        self.t = t;
        self.y = y;
        self.absolute_time = absolute_time;
        Ok(())
    }

    /// Replace the contents from a snapshot
    pub fn restore(&mut self, snapshot: LineSnapshot) -> Result<()> {
        self.set_data(snapshot.t, snapshot.y, snapshot.absolute_time)
    }

    pub fn snapshot(&self) -> LineSnapshot {
        LineSnapshot {
            t: self.t.clone(),
            y: self.y.clone(),
            absolute_time: self.absolute_time,
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn absolute_time(&self) -> f64 {
        self.absolute_time
    }

    pub fn last_value(&self) -> Option<f64> {
        self.y.last().copied()
    }

    /// Points as `[t, y]` pairs, for plotting
    pub fn points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.t.iter().zip(&self.y).map(|(&t, &y)| [t, y])
    }
}
