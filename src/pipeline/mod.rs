//! Plotting-surface controller.
//!
//! A [`TimePlotPipeline`] owns one [`SamplingWorker`] per line and the
//! receiving end of the event bridge. The UI thread drives it: it starts,
//! pauses and stops lines, and drains [`PipelineEvent`]s every frame.
//!
//! # Architecture
//!
//! ```text
//! [device 0] ─ worker thread ─┐
//! [device 1] ─ worker thread ─┼─► bounded channel ─► UI: TimePlotData::handle_event
//! [device n] ─ worker thread ─┘                          └─► AckToken ─► worker
//! ```
//!
//! Lines are independent: no ordering holds across lines, while samples of
//! one line arrive strictly in order.

pub mod bridge;

pub use bridge::{event_channel, PipelineEvent, SampleSink, Waker};

use crate::backend::device::Device;
use crate::backend::device_proxy::DeviceProxy;
use crate::backend::sampling::SamplingWorker;
use crate::config::SamplingConfig;
use crate::error::{Result, TimePlotError};
use crate::types::{LineId, LineStats, SamplingState};
use crossbeam_channel::Receiver;
use std::collections::BTreeMap;
use std::time::Duration;

/// Owns the sampling workers of every line and the UI side of the bridge
pub struct TimePlotPipeline {
    config: SamplingConfig,
    workers: BTreeMap<LineId, SamplingWorker>,
    sink: SampleSink,
    events: Receiver<PipelineEvent>,
    next_id: u32,
}

impl TimePlotPipeline {
    pub fn new(config: SamplingConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a pipeline whose workers call `waker` after queueing an event
    pub fn with_waker(config: SamplingConfig, waker: Waker) -> Self {
        Self::build(config, Some(waker))
    }

    fn build(config: SamplingConfig, waker: Option<Waker>) -> Self {
        let (sink, events) = event_channel(config.event_channel_capacity);
        let sink = match waker {
            Some(waker) => sink.with_waker(waker),
            None => sink,
        };
        Self {
            config,
            workers: BTreeMap::new(),
            sink,
            events,
            next_id: 0,
        }
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Attach a device as a new line; ids are allocated from 0 upward
    pub fn add_line(&mut self, device: impl Device + 'static) -> Result<LineId> {
        let id = LineId(self.next_id);
        self.add_line_with_id(id, device)?;
        Ok(id)
    }

    /// Attach a device under a caller-chosen id
    pub fn add_line_with_id(&mut self, id: LineId, device: impl Device + 'static) -> Result<()> {
        if self.workers.contains_key(&id) {
            return Err(TimePlotError::Config(format!("line {} already exists", id)));
        }

        let proxy = DeviceProxy::new(device, &self.config);
        tracing::info!(line = %id, device = %proxy.name(), "Adding line");
        let worker = SamplingWorker::new(id, proxy, self.sink.clone(), &self.config)?;
        self.workers.insert(id, worker);
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(())
    }

    /// Stop (if needed) and drop a line's worker
    pub fn remove_line(&mut self, id: LineId) -> Result<()> {
        let mut worker = self
            .workers
            .remove(&id)
            .ok_or(TimePlotError::UnknownLine(id))?;
        if worker.state().is_active() {
            worker.stop()?;
        }
        tracing::info!(line = %id, "Removed line");
        Ok(())
    }

    /// Ids of all lines in ascending order
    pub fn line_ids(&self) -> Vec<LineId> {
        self.workers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn worker(&self, id: LineId) -> Option<&SamplingWorker> {
        self.workers.get(&id)
    }

    /// Device proxy of a line, for calls such as `set_frequency`
    pub fn proxy(&self, id: LineId) -> Option<&DeviceProxy> {
        self.workers.get(&id).map(SamplingWorker::proxy)
    }

    pub fn state(&self, id: LineId) -> Option<SamplingState> {
        self.workers.get(&id).map(SamplingWorker::state)
    }

    pub fn stats(&self, id: LineId) -> Option<LineStats> {
        self.workers.get(&id).map(SamplingWorker::stats)
    }

    fn worker_mut(&mut self, id: LineId) -> Result<&mut SamplingWorker> {
        self.workers
            .get_mut(&id)
            .ok_or(TimePlotError::UnknownLine(id))
    }

    pub fn start(&mut self, id: LineId) -> Result<()> {
        self.worker_mut(id)?.start()
    }

    pub fn stop(&mut self, id: LineId) -> Result<()> {
        self.worker_mut(id)?.stop()
    }

    pub fn pause(&mut self, id: LineId) -> Result<()> {
        self.worker_mut(id)?.pause()
    }

    pub fn restart(&mut self, id: LineId) -> Result<()> {
        self.worker_mut(id)?.restart()
    }

    /// Start every line that is not running; returns the first error
    pub fn start_all(&mut self) -> Result<()> {
        self.for_each_line(|w| !w.state().is_active(), SamplingWorker::start)
    }

    /// Stop every running or paused line
    pub fn stop_all(&mut self) -> Result<()> {
        self.for_each_line(|w| w.state().is_active(), SamplingWorker::stop)
    }

    /// Pause every running line
    pub fn pause_all(&mut self) -> Result<()> {
        self.for_each_line(|w| w.state() == SamplingState::Running, SamplingWorker::pause)
    }

    /// Resume every paused line
    pub fn restart_all(&mut self) -> Result<()> {
        self.for_each_line(|w| w.state() == SamplingState::Paused, SamplingWorker::restart)
    }

    fn for_each_line(
        &mut self,
        applies: impl Fn(&SamplingWorker) -> bool,
        op: impl Fn(&mut SamplingWorker) -> Result<()>,
    ) -> Result<()> {
        let mut first_error = None;
        for (id, worker) in self.workers.iter_mut() {
            if !applies(worker) {
                continue;
            }
            if let Err(e) = op(worker) {
                tracing::warn!(line = %id, "Line operation failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Take every queued event without blocking
    pub fn drain_events(&self) -> Vec<PipelineEvent> {
        self.events.try_iter().collect()
    }

    pub fn try_recv_event(&self) -> Option<PipelineEvent> {
        self.events.try_recv().ok()
    }

    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<PipelineEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// The UI side of the event bridge
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }
}

impl Drop for TimePlotPipeline {
    fn drop(&mut self) {
        // Queued samples still hold ack tokens; release them before joining
        while self.events.try_recv().is_ok() {}
        if let Err(e) = self.stop_all() {
            tracing::warn!("Failed to stop all lines on shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy_device::{SequenceDevice, SignalDevice, SignalForm};
    use crate::backend::task::TaskArgs;
    use serde_json::json;

    fn config() -> SamplingConfig {
        SamplingConfig {
            ack_timeout_ms: 200,
            fault_backoff_ms: 10,
            pause_slice_ms: 10,
            ..SamplingConfig::default()
        }
    }

    #[test]
    fn test_line_ids_allocated_upward() {
        let mut pipeline = TimePlotPipeline::new(config());
        assert_eq!(pipeline.add_line(SequenceDevice::new([1.0])).unwrap(), LineId(0));
        assert_eq!(pipeline.add_line(SequenceDevice::new([1.0])).unwrap(), LineId(1));

        pipeline
            .add_line_with_id(LineId(7), SequenceDevice::new([1.0]))
            .unwrap();
        assert_eq!(pipeline.add_line(SequenceDevice::new([1.0])).unwrap(), LineId(8));
        assert!(pipeline
            .add_line_with_id(LineId(1), SequenceDevice::new([1.0]))
            .is_err());
        assert_eq!(pipeline.line_ids(), vec![LineId(0), LineId(1), LineId(7), LineId(8)]);
    }

    #[test]
    fn test_waker_fires_on_sample() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = wakes.clone();
        let mut pipeline = TimePlotPipeline::with_waker(
            config(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let id = pipeline.add_line(SequenceDevice::new([4.0])).unwrap();
        pipeline.start(id).unwrap();

        match pipeline.recv_event_timeout(Duration::from_secs(2)) {
            Some(PipelineEvent::Sample(sample)) => {
                assert_eq!(sample.value, 4.0);
                sample.ack.acknowledge();
            }
            other => panic!("unexpected event {:?}", other),
        }
        // The waker runs right after the send, possibly after our receive
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while wakes.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(wakes.load(Ordering::SeqCst) >= 1);
        pipeline.stop(id).unwrap();
    }

    #[test]
    fn test_unknown_line() {
        let mut pipeline = TimePlotPipeline::new(config());
        assert!(matches!(
            pipeline.start(LineId(3)),
            Err(TimePlotError::UnknownLine(LineId(3)))
        ));
        assert!(pipeline.remove_line(LineId(3)).is_err());
    }

    #[test]
    fn test_events_flow_and_remove_line() {
        let mut pipeline = TimePlotPipeline::new(config());
        let a = pipeline.add_line(SequenceDevice::new([1.0, 2.0])).unwrap();
        let b = pipeline.add_line(SequenceDevice::new([10.0, 20.0])).unwrap();
        pipeline.start_all().unwrap();

        let mut seen = Vec::new();
        while seen.len() < 2 {
            match pipeline.recv_event_timeout(Duration::from_secs(2)) {
                Some(PipelineEvent::Sample(sample)) => {
                    seen.push(sample.line_id);
                    sample.ack.acknowledge();
                }
                Some(PipelineEvent::Fault { .. }) => {}
                None => panic!("no event"),
            }
        }
        assert!(seen.contains(&a));
        assert!(seen.contains(&b));

        pipeline.remove_line(a).unwrap();
        assert_eq!(pipeline.line_ids(), vec![b]);
        pipeline.stop_all().unwrap();
        assert_eq!(pipeline.state(b), Some(SamplingState::Stopped));
    }

    #[test]
    fn test_bulk_operations_skip_lines_in_state() {
        let mut pipeline = TimePlotPipeline::new(config());
        let a = pipeline.add_line(SignalDevice::new(SignalForm::Sin)).unwrap();
        let b = pipeline.add_line(SignalDevice::new(SignalForm::Sin)).unwrap();

        pipeline.start(a).unwrap();
        pipeline.start_all().unwrap();
        assert_eq!(pipeline.state(b), Some(SamplingState::Running));

        pipeline.pause(a).unwrap();
        pipeline.pause_all().unwrap();
        pipeline.restart_all().unwrap();
        assert_eq!(pipeline.state(a), Some(SamplingState::Running));

        drop(pipeline.drain_events());
        pipeline.stop_all().unwrap();
        pipeline.stop_all().unwrap();
    }

    #[test]
    fn test_proxy_reaches_device_setters() {
        let mut pipeline = TimePlotPipeline::new(config());
        let id = pipeline
            .add_line(SignalDevice::new(SignalForm::Sin).with_frequency(1.0))
            .unwrap();

        let proxy = pipeline.proxy(id).unwrap();
        proxy
            .member("set_frequency")
            .unwrap()
            .call(TaskArgs::positional([json!(2.5)]))
            .unwrap();
        assert_eq!(
            proxy.member("get_frequency").unwrap().call(TaskArgs::none()).unwrap(),
            json!(2.5)
        );
    }
}
