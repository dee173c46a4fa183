//! Per-line sampling worker and its acknowledgement handshake
//!
//! A [`SamplingWorker`] drives one line: a continuous task on the device
//! proxy's worker thread reads the device, hands the value to the UI through
//! the pipeline bridge and then blocks until the UI acknowledges it. At most
//! one sample per line is ever unacknowledged, so a slow consumer throttles
//! its producer instead of letting a backlog build up.
//!
//! # Handshake
//!
//! ```text
//!  worker thread                         UI thread
//!  ─────────────                         ─────────
//!  lock; stamp time; in_flight = seq
//!  unlock; send Sample{ack: seq} ───────► on_sample(): append, redraw
//!  wait (≤ ack_timeout) ◄──────────────── ack.acknowledge()  (or drop)
//! ```
//!
//! The wait ends on acknowledgement, on `stop()`, or when `ack_timeout`
//! elapses. A timeout is reported as [`TimePlotError::SamplingStall`] and the
//! line keeps sampling.
//!
//! # Pausing
//!
//! While paused the sampling task blocks for at most `pause_slice` and
//! returns without touching the device, so the worker thread keeps serving
//! queued proxy calls.

use super::device::SharedDevice;
use super::device_proxy::DeviceProxy;
use super::task::{Task, TaskArgs};
use crate::config::SamplingConfig;
use crate::error::{Result, TimePlotError};
use crate::pipeline::bridge::{PipelineEvent, SampleSink};
use crate::types::{wall_clock_seconds, LineCounters, LineId, LineStats, SamplingState};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct HandshakeState {
    paused: bool,
    shutdown: bool,
    in_flight: Option<u64>,
    next_seq: u64,
}

/// Mutex + condition variable shared by a line's producer and consumer
#[derive(Debug, Default)]
pub(crate) struct Handshake {
    state: Mutex<HandshakeState>,
    cond: Condvar,
    counters: Arc<LineCounters>,
}

impl Handshake {
    fn new(counters: Arc<LineCounters>) -> Self {
        Self {
            state: Mutex::default(),
            cond: Condvar::new(),
            counters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandshakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the producer waiting on `seq`; stale sequence numbers are ignored
    fn acknowledge(&self, seq: u64) -> bool {
        let mut state = self.lock();
        if state.in_flight != Some(seq) {
            return false;
        }
        state.in_flight = None;
        LineCounters::bump(&self.counters.acknowledged);
        self.cond.notify_all();
        true
    }

    /// Whether the producer is still waiting on `seq`
    fn is_current(&self, seq: u64) -> bool {
        self.lock().in_flight == Some(seq)
    }

    /// Clear `seq` without counting it as acknowledged
    fn withdraw(&self, seq: u64) {
        let mut state = self.lock();
        if state.in_flight == Some(seq) {
            state.in_flight = None;
            self.cond.notify_all();
        }
    }

    fn set_paused(&self, paused: bool) {
        self.lock().paused = paused;
        self.cond.notify_all();
    }

    fn shut_down(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        state.in_flight = None;
        self.cond.notify_all();
    }

    fn reopen(&self) {
        let mut state = self.lock();
        state.shutdown = false;
        state.paused = false;
    }

    fn pending(&self) -> usize {
        usize::from(self.lock().in_flight.is_some())
    }

    /// Block for at most `slice` while paused; returns whether to sample now
    fn wait_while_paused(&self, slice: Duration) -> bool {
        let state = self.lock();
        if state.shutdown {
            return false;
        }
        if !state.paused {
            return true;
        }
        let (state, _) = self
            .cond
            .wait_timeout_while(state, slice, |s| s.paused && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        !state.paused && !state.shutdown
    }
}

/// Permission for a line's producer to continue
///
/// Acknowledges on [`acknowledge`](Self::acknowledge) or when dropped, so a
/// consumer that discards an event (or unwinds) never stalls its producer.
pub struct AckToken {
    handshake: Arc<Handshake>,
    seq: u64,
    released: bool,
}

impl AckToken {
    fn new(handshake: Arc<Handshake>, seq: u64) -> Self {
        Self {
            handshake,
            seq,
            released: false,
        }
    }

    /// Sequence number of the sample this token belongs to
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Whether the producer still waits on this sample
    ///
    /// `false` once the producer gave up on it (timeout or stop); such a
    /// sample was already reported as dropped and must not be recorded.
    pub fn is_current(&self) -> bool {
        self.handshake.is_current(self.seq)
    }

    /// Let the producer continue
    ///
    /// Returns `false` when the producer had already given up on this sample
    /// (timeout or stop).
    pub fn acknowledge(mut self) -> bool {
        self.released = true;
        self.handshake.acknowledge(self.seq)
    }

    /// Release without counting as acknowledged (event never delivered)
    fn withdraw(mut self) {
        self.released = true;
        self.handshake.withdraw(self.seq);
    }
}

impl Drop for AckToken {
    fn drop(&mut self) {
        if !self.released {
            self.handshake.acknowledge(self.seq);
        }
    }
}

impl fmt::Debug for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckToken")
            .field("seq", &self.seq)
            .field("released", &self.released)
            .finish()
    }
}

/// One reading on its way to the UI
#[derive(Debug)]
pub struct Sample {
    pub line_id: LineId,
    pub value: f64,
    /// Wall-clock seconds since the Unix epoch
    pub timestamp: f64,
    pub ack: AckToken,
}

impl Sample {
    /// A sample that belongs to no producer; acknowledging it does nothing
    ///
    /// Used to replay recorded values through the consumer.
    pub fn detached(line_id: LineId, value: f64, timestamp: f64) -> Self {
        let handshake = Arc::new(Handshake::new(Arc::new(LineCounters::default())));
        handshake.lock().in_flight = Some(0);
        Self {
            line_id,
            value,
            timestamp,
            ack: AckToken::new(handshake, 0),
        }
    }
}

/// State captured by the continuous sampling task
struct Sampler {
    line_id: LineId,
    device: SharedDevice,
    handshake: Arc<Handshake>,
    counters: Arc<LineCounters>,
    sink: SampleSink,
    ack_timeout: Duration,
    pause_slice: Duration,
    fault_backoff: Duration,
    fault_streak: u64,
}

impl Sampler {
    fn run_once(&mut self) {
        if !self.handshake.wait_while_paused(self.pause_slice) {
            return;
        }

        let reading = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_value();

        match reading {
            Ok(value) => {
                self.fault_streak = 0;
                self.emit_and_wait(value);
            }
            Err(error) => self.report_fault(error),
        }
    }

    fn emit_and_wait(&mut self, value: f64) {
        let (seq, timestamp) = {
            let mut state = self.handshake.lock();
            if state.shutdown || state.paused {
                tracing::trace!(line = %self.line_id, "Discarding value sampled during pause/stop");
                return;
            }
            let seq = state.next_seq;
            state.next_seq += 1;
            state.in_flight = Some(seq);
            (seq, wall_clock_seconds())
        };

        let sample = Sample {
            line_id: self.line_id,
            value,
            timestamp,
            ack: AckToken::new(self.handshake.clone(), seq),
        };

        if let Err(event) = self.sink.send(PipelineEvent::Sample(sample)) {
            LineCounters::bump(&self.counters.dropped);
            tracing::debug!(line = %self.line_id, "Event bridge full or closed, sample dropped");
            if let PipelineEvent::Sample(sample) = event {
                sample.ack.withdraw();
            }
            return;
        }
        LineCounters::bump(&self.counters.emitted);

        // No deadline when the timeout is too large to represent
        let deadline = Instant::now().checked_add(self.ack_timeout);
        let mut state = self.handshake.lock();
        loop {
            if state.in_flight != Some(seq) || state.shutdown {
                return;
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        state.in_flight = None;
                        break;
                    }
                    self.handshake
                        .cond
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .handshake
                    .cond
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        drop(state);

        LineCounters::bump(&self.counters.stalls);
        tracing::warn!(
            line = %self.line_id,
            seq,
            "Sample not acknowledged within {:?}, dropping it",
            self.ack_timeout
        );
        self.send_fault(TimePlotError::SamplingStall {
            line_id: self.line_id,
            waited: self.ack_timeout,
        });
    }

    fn report_fault(&mut self, error: TimePlotError) {
        LineCounters::bump(&self.counters.faults);
        if self.fault_streak == 0 {
            tracing::warn!(line = %self.line_id, "Device read failed: {}", error);
        } else {
            tracing::debug!(line = %self.line_id, streak = self.fault_streak, "Device read failed: {}", error);
        }
        self.fault_streak += 1;
        self.send_fault(error);
        std::thread::sleep(self.fault_backoff);
    }

    fn send_fault(&self, error: TimePlotError) {
        let event = PipelineEvent::Fault {
            line_id: self.line_id,
            error,
        };
        if self.sink.send(event).is_err() {
            LineCounters::bump(&self.counters.dropped);
        }
    }
}

/// Drives sampling of one line through its device proxy
pub struct SamplingWorker {
    line_id: LineId,
    proxy: DeviceProxy,
    sink: SampleSink,
    handshake: Arc<Handshake>,
    counters: Arc<LineCounters>,
    config: SamplingConfig,
    task: Task,
    state: SamplingState,
}

impl SamplingWorker {
    /// Create an idle worker; its sampling task is queued immediately
    pub fn new(
        line_id: LineId,
        proxy: DeviceProxy,
        sink: SampleSink,
        config: &SamplingConfig,
    ) -> Result<Self> {
        let counters = Arc::new(LineCounters::default());
        let handshake = Arc::new(Handshake::new(counters.clone()));
        let task = build_sampling_task(line_id, &proxy, &sink, &handshake, &counters, config)?;
        proxy.enqueue(task.clone());

        Ok(Self {
            line_id,
            proxy,
            sink,
            handshake,
            counters,
            config: config.clone(),
            task,
            state: SamplingState::Idle,
        })
    }

    pub fn line_id(&self) -> LineId {
        self.line_id
    }

    pub fn state(&self) -> SamplingState {
        self.state
    }

    /// The device proxy, for calls such as `set_frequency`
    pub fn proxy(&self) -> &DeviceProxy {
        &self.proxy
    }

    /// Snapshot of this line's counters
    pub fn stats(&self) -> LineStats {
        self.counters.snapshot()
    }

    /// Unacknowledged samples (0 or 1)
    pub fn pending_acks(&self) -> usize {
        self.handshake.pending()
    }

    /// Idle/Stopped -> Running
    pub fn start(&mut self) -> Result<()> {
        if self.state.is_active() {
            return Err(TimePlotError::AlreadyRunning(format!(
                "line {} is {}",
                self.line_id, self.state
            )));
        }

        if self.task.is_retired() {
            tracing::warn!(line = %self.line_id, "Sampling task was retired, rebuilding it");
            self.task = build_sampling_task(
                self.line_id,
                &self.proxy,
                &self.sink,
                &self.handshake,
                &self.counters,
                &self.config,
            )?;
            self.proxy.enqueue(self.task.clone());
        }

        self.handshake.reopen();
        self.proxy.start()?;
        self.state = SamplingState::Running;
        tracing::info!(line = %self.line_id, device = %self.proxy.name(), "Sampling started");
        Ok(())
    }

    /// Running/Paused -> Stopped
    ///
    /// Releases a pending acknowledgement wait, then stops and joins the
    /// worker thread. The sampling task stays queued for the next `start()`.
    pub fn stop(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(TimePlotError::NotRunning(format!(
                "line {} is {}",
                self.line_id, self.state
            )));
        }

        self.handshake.shut_down();
        match self.proxy.stop() {
            Ok(()) | Err(TimePlotError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.proxy.join();
        self.state = SamplingState::Stopped;
        tracing::info!(line = %self.line_id, "Sampling stopped");
        Ok(())
    }

    /// Running -> Paused; no-op when already paused
    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SamplingState::Paused => Ok(()),
            SamplingState::Running => {
                self.handshake.set_paused(true);
                self.state = SamplingState::Paused;
                tracing::debug!(line = %self.line_id, "Sampling paused");
                Ok(())
            }
            other => Err(TimePlotError::NotRunning(format!(
                "line {} is {}",
                self.line_id, other
            ))),
        }
    }

    /// Paused -> Running; no-op when already running
    pub fn restart(&mut self) -> Result<()> {
        match self.state {
            SamplingState::Running => Ok(()),
            SamplingState::Paused => {
                self.handshake.set_paused(false);
                self.state = SamplingState::Running;
                tracing::debug!(line = %self.line_id, "Sampling resumed");
                Ok(())
            }
            other => Err(TimePlotError::NotRunning(format!(
                "line {} is {}",
                self.line_id, other
            ))),
        }
    }
}

impl Drop for SamplingWorker {
    fn drop(&mut self) {
        // Release a pending wait before the proxy joins its thread
        self.handshake.shut_down();
    }
}

impl fmt::Debug for SamplingWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplingWorker")
            .field("line_id", &self.line_id)
            .field("state", &self.state)
            .field("proxy", &self.proxy)
            .finish()
    }
}

fn build_sampling_task(
    line_id: LineId,
    proxy: &DeviceProxy,
    sink: &SampleSink,
    handshake: &Arc<Handshake>,
    counters: &Arc<LineCounters>,
    config: &SamplingConfig,
) -> Result<Task> {
    let mut sampler = Sampler {
        line_id,
        device: proxy.device().clone(),
        handshake: handshake.clone(),
        counters: counters.clone(),
        sink: sink.clone(),
        ack_timeout: config.ack_timeout(),
        pause_slice: config.pause_slice(),
        fault_backoff: config.fault_backoff(),
        fault_streak: 0,
    };

    Task::builder(format!("sample-line-{}", line_id), move |_: &TaskArgs| {
        sampler.run_once();
        Ok(())
    })
    .continuous(true)
    .build()
}
