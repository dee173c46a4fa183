//! Core data types for timeplot-rs
//!
//! This module contains the small value types shared by the backend
//! (sampling workers), the pipeline and the UI-side data buffers.
//!
//! # Main Types
//!
//! - [`LineId`] - Identifier of one plotted line / data source
//! - [`SamplingState`] - Lifecycle state of a sampling worker
//! - [`LineStats`] - Snapshot of a line's sampling counters
//!
//! # Time Base
//!
//! Samples are stamped with wall-clock time in seconds since the Unix epoch
//! ([`wall_clock_seconds`]). Data buffers store time relative to a per-line
//! `absolute_time` origin.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a plotted line (one data source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct LineId(pub u32);

impl LineId {
    /// Key under which this line's data is persisted (`data_{id}`)
    pub fn data_key(&self) -> String {
        format!("data_{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LineId {
    fn from(id: u32) -> Self {
        LineId(id)
    }
}

/// Lifecycle state of a sampling worker
///
/// `Idle -> Running <-> Paused -> Stopped`, and `Stopped -> Running` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SamplingState {
    /// Constructed, never started
    #[default]
    Idle,
    /// Sampling and emitting values
    Running,
    /// Worker alive but not sampling
    Paused,
    /// Worker thread stopped
    Stopped,
}

impl SamplingState {
    /// Whether the worker thread is expected to be alive in this state
    pub fn is_active(&self) -> bool {
        matches!(self, SamplingState::Running | SamplingState::Paused)
    }
}

impl fmt::Display for SamplingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SamplingState::Idle => write!(f, "Idle"),
            SamplingState::Running => write!(f, "Running"),
            SamplingState::Paused => write!(f, "Paused"),
            SamplingState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Snapshot of the sampling counters of one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStats {
    /// Samples handed to the UI bridge
    pub emitted: u64,
    /// Samples acknowledged by the consumer
    pub acknowledged: u64,
    /// Acknowledgement timeouts
    pub stalls: u64,
    /// Device errors while sampling
    pub faults: u64,
    /// Events dropped because the bridge was full or closed
    pub dropped: u64,
}

/// Lock-free counters shared between a sampling worker and its thread
#[derive(Debug, Default)]
pub(crate) struct LineCounters {
    pub emitted: AtomicU64,
    pub acknowledged: AtomicU64,
    pub stalls: AtomicU64,
    pub faults: AtomicU64,
    pub dropped: AtomicU64,
}

impl LineCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LineStats {
        LineStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Current wall-clock time in seconds since the Unix epoch
pub fn wall_clock_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
