//! Thread boundary between the sampling workers and the UI.
//!
//! Every sampling worker holds a [`SampleSink`]; the UI thread holds the
//! matching receiver. The channel is bounded: a full channel drops the event
//! instead of blocking a worker, and the worker counts the drop.

use crate::backend::sampling::Sample;
use crate::error::TimePlotError;
use crate::types::LineId;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fmt;
use std::sync::Arc;

/// Callback that wakes the UI thread after an event was queued
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Messages sent from sampling workers to the UI thread.
#[derive(Debug)]
pub enum PipelineEvent {
    /// A new reading, to be acknowledged via its token.
    Sample(Sample),

    /// A device error or acknowledgement stall on a line.
    Fault { line_id: LineId, error: TimePlotError },
}

impl PipelineEvent {
    /// Line the event belongs to
    pub fn line_id(&self) -> LineId {
        match self {
            PipelineEvent::Sample(sample) => sample.line_id,
            PipelineEvent::Fault { line_id, .. } => *line_id,
        }
    }
}

/// Worker-side half of the event bridge.
#[derive(Clone)]
pub struct SampleSink {
    tx: Sender<PipelineEvent>,
    waker: Option<Waker>,
}

impl SampleSink {
    pub fn new(tx: Sender<PipelineEvent>) -> Self {
        Self { tx, waker: None }
    }

    /// Invoke `waker` after every queued event
    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    /// Queue an event without blocking.
    ///
    /// Hands the event back when the channel is full or the UI side is gone.
    pub fn send(&self, event: PipelineEvent) -> Result<(), PipelineEvent> {
        match self.tx.try_send(event) {
            Ok(()) => {
                if let Some(waker) = &self.waker {
                    waker();
                }
                Ok(())
            }
            Err(TrySendError::Full(event)) | Err(TrySendError::Disconnected(event)) => Err(event),
        }
    }

    /// Events waiting to be consumed
    pub fn backlog(&self) -> usize {
        self.tx.len()
    }
}

impl fmt::Debug for SampleSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleSink")
            .field("backlog", &self.tx.len())
            .field("has_waker", &self.waker.is_some())
            .finish()
    }
}

/// Create a bridge pair: `(sink_for_workers, receiver_for_ui)`.
pub fn event_channel(capacity: usize) -> (SampleSink, Receiver<PipelineEvent>) {
    let (tx, rx) = bounded(capacity.max(1));
    (SampleSink::new(tx), rx)
}
