//! Synchronous-looking facade over a threaded device
//!
//! A [`DeviceProxy`] owns a device and one [`WorkerThread`]. Calling a device
//! member through the proxy behaves like a plain method call:
//!
//! - worker stopped: the member is invoked directly on the caller's thread
//! - worker running: the call is wrapped in a one-shot [`Task`], queued
//!   behind whatever the worker is doing, and the caller blocks on a
//!   per-call reply channel until the task has run or `call_timeout` passes
//!
//! Member lookup happens before any of this, so an unknown member fails with
//! [`TimePlotError::AttributeNotFound`] regardless of worker state.

use super::device::{value_as_f64, Device, MemberKind, SharedDevice, GET_VALUE};
use super::task::{Task, TaskArgs};
use super::worker_thread::{TaskQueue, WorkerThread};
use crate::config::SamplingConfig;
use crate::error::{Result, TimePlotError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Receiving end of a submitted call
pub type Reply = Receiver<Result<Value>>;

/// Threaded wrapper around a [`Device`]
pub struct DeviceProxy {
    device: SharedDevice,
    device_name: String,
    worker: WorkerThread,
    call_timeout: Duration,
}

impl DeviceProxy {
    /// Wrap `device`; the worker starts stopped
    pub fn new(device: impl Device + 'static, config: &SamplingConfig) -> Self {
        Self::from_shared(Arc::new(Mutex::new(Box::new(device))), config)
    }

    /// Wrap an already shared device
    pub fn from_shared(device: SharedDevice, config: &SamplingConfig) -> Self {
        let device_name = device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name();
        Self {
            device,
            device_name,
            worker: WorkerThread::new(TaskQueue::new(), config.yield_interval()),
            call_timeout: config.call_timeout(),
        }
    }

    /// Name of the wrapped device
    pub fn name(&self) -> &str {
        &self.device_name
    }

    /// The wrapped device
    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    /// The worker's task queue
    pub fn queue(&self) -> &TaskQueue {
        self.worker.queue()
    }

    /// Queue a task on the proxy's worker
    pub fn enqueue(&self, task: Task) {
        self.worker.enqueue(task);
    }

    /// Look up a device member by name
    pub fn member(&self, name: &str) -> Result<Member<'_>> {
        let kind = self
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .member_kind(name)
            .ok_or_else(|| TimePlotError::AttributeNotFound {
                device: self.device_name.clone(),
                member: name.to_string(),
            })?;
        Ok(Member {
            proxy: self,
            name: name.to_string(),
            kind,
        })
    }

    /// Read the device's current value
    pub fn get_value(&self) -> Result<f64> {
        let value = self.member(GET_VALUE)?.call(TaskArgs::none())?;
        value_as_f64(&value)
    }

    /// Start the worker thread
    pub fn start(&self) -> Result<()> {
        if self.worker.is_alive() {
            return Err(TimePlotError::AlreadyRunning(format!(
                "thread of device '{}' runs already",
                self.device_name
            )));
        }
        self.worker.start()?;
        tracing::debug!(device = %self.device_name, "Device worker started");
        Ok(())
    }

    /// Ask the worker thread to stop; see [`join`](Self::join)
    pub fn stop(&self) -> Result<()> {
        if !self.worker.is_alive() {
            return Err(TimePlotError::NotRunning(format!(
                "thread of device '{}' is not running",
                self.device_name
            )));
        }
        self.worker.stop()?;
        tracing::debug!(device = %self.device_name, "Device worker stop requested");
        Ok(())
    }

    /// Wait for a stopped worker thread to exit
    pub fn join(&self) {
        self.worker.join();
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker.is_alive()
    }

    fn lock_device(&self) -> std::sync::MutexGuard<'_, Box<dyn Device>> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `op` on the worker thread; the result arrives on the returned channel
    fn submit_op<F>(&self, member: &str, args: TaskArgs, mut op: F) -> Result<Reply>
    where
        F: FnMut(&mut dyn Device, &TaskArgs) -> Result<Value> + Send + 'static,
    {
        let (reply_tx, reply_rx) = bounded(1);
        let device = self.device.clone();

        let task = Task::builder(format!("{}.{}", self.device_name, member), move |args| {
            let mut device = device.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut **device, args)
        })
        .task_args(args)
        .callback(move |result| {
            // The caller may have timed out and dropped the receiver
            let _ = reply_tx.try_send(result);
        })
        .build()?;

        tracing::trace!(device = %self.device_name, member, "Dispatching call to worker");
        self.worker.enqueue(task);
        Ok(reply_rx)
    }

    /// Run `op` on the worker thread and wait for its result
    fn dispatch<F>(&self, member: &str, args: TaskArgs, op: F) -> Result<Value>
    where
        F: FnMut(&mut dyn Device, &TaskArgs) -> Result<Value> + Send + 'static,
    {
        let reply = self.submit_op(member, args, op)?;
        match reply.recv_timeout(self.call_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TimePlotError::CallTimeout {
                member: member.to_string(),
                timeout: self.call_timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(TimePlotError::Channel(format!(
                "call to '{}' was dropped before it ran",
                member
            ))),
        }
    }
}

impl std::fmt::Debug for DeviceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceProxy")
            .field("device", &self.device_name)
            .field("running", &self.is_running())
            .field("queued", &self.queue().len())
            .finish()
    }
}

/// A resolved device member
pub struct Member<'a> {
    proxy: &'a DeviceProxy,
    name: String,
    kind: MemberKind,
}

impl Member<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Invoke a method member
    pub fn call(&self, args: TaskArgs) -> Result<Value> {
        if self.kind != MemberKind::Method {
            return Err(TimePlotError::InvalidTask(format!(
                "'{}' of device '{}' is not callable",
                self.name, self.proxy.device_name
            )));
        }

        if !self.proxy.is_running() {
            return self.proxy.lock_device().call_method(&self.name, &args);
        }

        let name = self.name.clone();
        self.proxy
            .dispatch(&self.name, args, move |device, args| {
                device.call_method(&name, args)
            })
    }

    /// Invoke a method member without waiting for the result
    ///
    /// Use this from the thread that acknowledges samples: a blocking
    /// [`call`](Self::call) from there waits on a worker that is itself
    /// waiting for an acknowledgement.
    pub fn submit(&self, args: TaskArgs) -> Result<Reply> {
        if self.kind != MemberKind::Method {
            return Err(TimePlotError::InvalidTask(format!(
                "'{}' of device '{}' is not callable",
                self.name, self.proxy.device_name
            )));
        }

        if !self.proxy.is_running() {
            let (tx, rx) = bounded(1);
            let _ = tx.send(self.proxy.lock_device().call_method(&self.name, &args));
            return Ok(rx);
        }

        let name = self.name.clone();
        self.proxy
            .submit_op(&self.name, args, move |device, args| {
                device.call_method(&name, args)
            })
    }

    /// Read an attribute member
    pub fn value(&self) -> Result<Value> {
        if self.kind != MemberKind::Attribute {
            return Err(TimePlotError::InvalidTask(format!(
                "'{}' of device '{}' is a method, not an attribute",
                self.name, self.proxy.device_name
            )));
        }

        if !self.proxy.is_running() {
            return self.proxy.lock_device().read_attribute(&self.name);
        }

        let name = self.name.clone();
        self.proxy
            .dispatch(&self.name, TaskArgs::none(), move |device, _| {
                device.read_attribute(&name)
            })
    }
}
