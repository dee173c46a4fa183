//! Task queue and the background thread that drains it
//!
//! A [`WorkerThread`] owns one OS thread that repeatedly takes the oldest
//! [`Task`] from its [`TaskQueue`] and executes it. Continuous tasks are put
//! back at the tail *before* they run, so a long continuous task cannot
//! starve one-shot tasks queued behind it, and a `stop()` issued while it
//! runs still leaves it queued for the next `start()`.
//!
//! # Failure Policy
//!
//! - A task whose callable returns `Err` hands the error to its callback (or
//!   logs it); the loop continues.
//! - A task that panics is caught, logged and retired. A retired continuous
//!   task is dropped the next time it is dequeued.

use super::task::Task;
use crate::error::{Result, TimePlotError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default pause between task executions and empty-queue polls
pub const DEFAULT_YIELD_INTERVAL: Duration = Duration::from_millis(1);

/// Global counter for worker thread names
static NEXT_WORKER_ID: AtomicU32 = AtomicU32::new(0);

/// Unbounded FIFO of tasks
///
/// Clones share the same underlying queue.
#[derive(Clone)]
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append a task to the tail of the queue
    pub fn enqueue(&self, task: Task) {
        // The queue holds its own receiver, so the channel can never be disconnected
        let _ = self.tx.send(task);
    }

    /// Append a dynamically-typed item, which must be a [`Task`]
    pub fn enqueue_any(&self, item: Box<dyn Any + Send>) -> Result<()> {
        match item.downcast::<Task>() {
            Ok(task) => {
                self.enqueue(*task);
                Ok(())
            }
            Err(_) => Err(TimePlotError::InvalidTask(
                "argument needs to be a Task".to_string(),
            )),
        }
    }

    /// Number of queued tasks
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Whether `task` is currently queued
    ///
    /// Drains and re-fills the queue; only call this while no worker is
    /// consuming it.
    pub fn contains(&self, task: &Task) -> bool {
        let drained: Vec<Task> = self.rx.try_iter().collect();
        let found = drained.iter().any(|t| t.same_task(task));
        for t in drained {
            self.enqueue(t);
        }
        found
    }

    fn pop_timeout(&self, timeout: Duration) -> std::result::Result<Task, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// A background thread draining a [`TaskQueue`]
pub struct WorkerThread {
    name: String,
    queue: TaskQueue,
    running: Arc<AtomicBool>,
    yield_interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerThread {
    /// Create a stopped worker for `queue`
    pub fn new(queue: TaskQueue, yield_interval: Duration) -> Self {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::SeqCst);
        Self {
            name: format!("timeplot-worker-{}", id),
            queue,
            running: Arc::new(AtomicBool::new(false)),
            yield_interval,
            handle: Mutex::new(None),
        }
    }

    /// Thread name used for the OS thread and in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The queue this worker drains
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Append a task to the worker's queue
    pub fn enqueue(&self, task: Task) {
        self.queue.enqueue(task);
    }

    /// Begin draining the queue on a new thread
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(TimePlotError::AlreadyRunning(format!(
                "worker thread {} runs already",
                self.name
            )));
        }
        // Reap a previous, already finished run
        if let Some(previous) = handle.take() {
            let _ = previous.join();
        }

        self.running.store(true, Ordering::SeqCst);
        let queue = self.queue.clone();
        let running = self.running.clone();
        let yield_interval = self.yield_interval;
        let name = self.name.clone();

        let spawned = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(&name, &queue, &running, yield_interval));

        match spawned {
            Ok(h) => {
                *handle = Some(h);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(TimePlotError::Io(e))
            }
        }
    }

    /// Request loop termination
    ///
    /// Returns immediately; a task that is executing runs to completion.
    pub fn stop(&self) -> Result<()> {
        if !self.is_alive() {
            return Err(TimePlotError::NotRunning(format!(
                "worker thread {} is not running",
                self.name
            )));
        }
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Wait for the thread to exit
    ///
    /// Only meaningful after [`stop`](Self::stop); does nothing when called
    /// from the worker thread itself.
    pub fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(h) = handle {
            if h.thread().id() == std::thread::current().id() {
                // Cannot join ourselves; keep the handle for a later reap
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(h);
                return;
            }
            if h.join().is_err() {
                tracing::error!(worker = %self.name, "Worker thread panicked");
            }
        }
    }

    /// Whether the OS thread is still running
    pub fn is_alive(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Whether the worker is alive and has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.is_alive()
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
    }
}

fn run_loop(name: &str, queue: &TaskQueue, running: &AtomicBool, yield_interval: Duration) {
    tracing::debug!(worker = %name, "Worker thread started");

    while running.load(Ordering::SeqCst) {
        match queue.pop_timeout(yield_interval) {
            Ok(task) => {
                process_task(name, queue, task);
                std::thread::sleep(yield_interval);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(worker = %name, "Worker thread stopped");
}

fn process_task(name: &str, queue: &TaskQueue, task: Task) {
    if task.is_retired() {
        tracing::debug!(worker = %name, task = %task.label(), "Dropping retired task");
        return;
    }
    if task.is_continuous() {
        queue.enqueue(task.clone());
    }

    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task.execute())) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(
            worker = %name,
            task = %task.label(),
            "Task panicked, retiring it: {}",
            message
        );
        task.retire();
    }
}
