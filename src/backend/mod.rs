//! Backend module: devices, task queues and sampling threads
//!
//! Everything here runs off the UI thread. Each plotted line owns one
//! [`DeviceProxy`] (a device plus one [`WorkerThread`]) and one
//! [`SamplingWorker`] whose continuous task lives on that proxy's queue.
//! Values travel to the UI as [`PipelineEvent`](crate::pipeline::PipelineEvent)s.
//!
//! # Components
//!
//! - [`Task`] - Queued unit of work, one-shot or continuous
//! - [`TaskQueue`] / [`WorkerThread`] - FIFO and the thread draining it
//! - [`Device`] - Interface of a polled data source
//! - [`DeviceProxy`] - Makes a threaded device look synchronous
//! - [`SignalDevice`] / [`SequenceDevice`] - Simulated devices
//! - [`SamplingWorker`] - Per-line sampling state machine and ack handshake
//!
//! # Example
//!
//! ```ignore
//! use timeplot_rs::backend::{DeviceProxy, SamplingWorker, SignalDevice, SignalForm};
//! use timeplot_rs::config::SamplingConfig;
//! use timeplot_rs::pipeline::bridge::event_channel;
//!
//! let config = SamplingConfig::default();
//! let (sink, events) = event_channel(config.event_channel_capacity);
//! let proxy = DeviceProxy::new(SignalDevice::new(SignalForm::Sin), &config);
//! let mut worker = SamplingWorker::new(LineId(0), proxy, sink, &config)?;
//! worker.start()?;
//! ```

pub mod device;
pub mod device_proxy;
pub mod dummy_device;
pub mod sampling;
pub mod task;
pub mod worker_thread;

pub use device::{shared, value_as_f64, Device, MemberKind, SharedDevice, GET_VALUE};
pub use device_proxy::{DeviceProxy, Member, Reply};
pub use dummy_device::{SequenceDevice, SignalDevice, SignalForm};
pub use sampling::{AckToken, Sample, SamplingWorker};
pub use task::{Task, TaskArgs, TaskBuilder, TaskId};
pub use worker_thread::{TaskQueue, WorkerThread, DEFAULT_YIELD_INTERVAL};
