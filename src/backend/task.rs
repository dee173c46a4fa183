//! Queued units of work
//!
//! A [`Task`] wraps a callable, its arguments, an optional completion
//! callback and a `continuous` flag. Tasks are executed by a
//! [`WorkerThread`](super::worker_thread::WorkerThread); a continuous task is
//! put back at the tail of its queue every time it is dequeued.
//!
//! `Task` is a cheap handle over shared state, so re-queueing a continuous
//! task moves the same task (same [`TaskId`]) back into the queue.
//!
//! # Example
//!
//! ```ignore
//! use timeplot_rs::backend::task::Task;
//! use serde_json::json;
//!
//! let task = Task::builder("add", |args| {
//!         let a = args.positional[0].as_f64().unwrap_or(0.0);
//!         let b = args.keyword.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0);
//!         Ok(a + b)
//!     })
//!     .args(json!([1.5]))
//!     .kwargs(json!({ "b": 2.0 }))
//!     .callback(|sum| println!("{sum:?}"))
//!     .build()?;
//! ```

use crate::error::{Result, TimePlotError};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Global counter for generating unique task IDs
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier of a task, preserved across re-queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Positional and keyword arguments handed to a task's callable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskArgs {
    /// Positional arguments in call order
    pub positional: Vec<Value>,
    /// Keyword arguments
    pub keyword: Map<String, Value>,
}

impl TaskArgs {
    /// No arguments
    pub fn none() -> Self {
        Self::default()
    }

    /// Positional arguments only
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            keyword: Map::new(),
        }
    }

    /// Build arguments from dynamic values
    ///
    /// `args` must be a JSON array and `kwargs` a JSON object; `None` and
    /// `null` mean "no arguments".
    pub fn from_values(args: Option<Value>, kwargs: Option<Value>) -> Result<Self> {
        let positional = match args {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values,
            Some(other) => {
                return Err(TimePlotError::InvalidTask(format!(
                    "args is not a list-like value: {}",
                    other
                )))
            }
        };

        let keyword = match kwargs {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(TimePlotError::InvalidTask(format!(
                    "kwargs needs to be a string-keyed mapping: {}",
                    other
                )))
            }
        };

        Ok(Self { positional, keyword })
    }

    /// Positional argument at `index`, falling back to keyword `name`
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.keyword.get(name))
    }

    /// Whether no arguments were given
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

type Job = Box<dyn FnMut(&TaskArgs) + Send>;

struct TaskInner {
    id: TaskId,
    label: String,
    continuous: bool,
    args: TaskArgs,
    job: Mutex<Job>,
    retired: AtomicBool,
    runs: AtomicU64,
}

/// A queued unit of work
///
/// Cloning a `Task` yields another handle to the same task.
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

impl Task {
    /// Start building a task around `func`
    pub fn builder<T, F>(label: impl Into<String>, func: F) -> TaskBuilder<T>
    where
        F: FnMut(&TaskArgs) -> Result<T> + Send + 'static,
        T: 'static,
    {
        TaskBuilder {
            label: label.into(),
            func: Box::new(func),
            args: None,
            kwargs: None,
            continuous: false,
            callback: None,
        }
    }

    /// Stable identifier
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Human-readable label used in logs
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the task is re-queued after each run
    pub fn is_continuous(&self) -> bool {
        self.inner.continuous
    }

    /// The arguments the callable is invoked with
    pub fn args(&self) -> &TaskArgs {
        &self.inner.args
    }

    /// Number of completed executions
    pub fn runs(&self) -> u64 {
        self.inner.runs.load(Ordering::Relaxed)
    }

    /// Invoke the callable with the stored arguments and hand the result to
    /// the callback, if any
    pub fn execute(&self) {
        let mut job = self.inner.job.lock().unwrap_or_else(PoisonError::into_inner);
        (*job)(&self.inner.args);
        self.inner.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the task so the worker drops it instead of running it again
    pub fn retire(&self) {
        self.inner.retired.store(true, Ordering::SeqCst);
    }

    /// Whether the task has been retired
    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same task
    pub fn same_task(&self, other: &Task) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("continuous", &self.inner.continuous)
            .field("runs", &self.runs())
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Builder for [`Task`]
pub struct TaskBuilder<T> {
    label: String,
    func: Box<dyn FnMut(&TaskArgs) -> Result<T> + Send>,
    args: Option<Value>,
    kwargs: Option<Value>,
    continuous: bool,
    callback: Option<Box<dyn FnMut(Result<T>) + Send>>,
}

impl<T: 'static> TaskBuilder<T> {
    /// Positional arguments (must be a JSON array)
    pub fn args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    /// Keyword arguments (must be a JSON object)
    pub fn kwargs(mut self, kwargs: Value) -> Self {
        self.kwargs = Some(kwargs);
        self
    }

    /// Already-validated arguments
    pub fn task_args(mut self, args: TaskArgs) -> Self {
        self.args = Some(Value::Array(args.positional));
        self.kwargs = Some(Value::Object(args.keyword));
        self
    }

    /// Re-queue the task after every run
    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    /// Receive the callable's result after each run
    pub fn callback<C>(mut self, callback: C) -> Self
    where
        C: FnMut(Result<T>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Validate the arguments and produce the task
    pub fn build(self) -> Result<Task> {
        let args = TaskArgs::from_values(self.args, self.kwargs)?;
        let label = self.label;
        let log_label = label.clone();
        let mut func = self.func;
        let mut callback = self.callback;

        let job: Job = Box::new(move |args: &TaskArgs| {
            let result = func(args);
            match callback.as_mut() {
                Some(cb) => cb(result),
                None => {
                    if let Err(e) = result {
                        tracing::warn!(task = %log_label, "Task failed: {}", e);
                    }
                }
            }
        });

        Ok(Task {
            inner: Arc::new(TaskInner {
                id: TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::SeqCst)),
                label,
                continuous: self.continuous,
                args,
                job: Mutex::new(job),
                retired: AtomicBool::new(false),
                runs: AtomicU64::new(0),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    #[test]
    fn test_execute_passes_args_to_callback() {
        let (tx, rx) = mpsc::channel();
        let task = Task::builder("sum", |args: &TaskArgs| {
            let a = args.positional[0].as_f64().unwrap_or_default();
            let b = args.get(1, "b").and_then(Value::as_f64).unwrap_or_default();
            Ok(a + b)
        })
        .args(json!([1.5]))
        .kwargs(json!({ "b": 2.0 }))
        .callback(move |r| tx.send(r.ok()).unwrap())
        .build()
        .unwrap();

        task.execute();
        assert_eq!(rx.recv().unwrap(), Some(3.5));
        assert_eq!(task.runs(), 1);
    }

    #[test]
    fn test_rejects_non_list_args() {
        let result = Task::builder("bad", |_: &TaskArgs| Ok(()))
            .args(json!(5))
            .build();
        assert!(matches!(result, Err(TimePlotError::InvalidTask(_))));
    }

    #[test]
    fn test_rejects_non_mapping_kwargs() {
        let result = Task::builder("bad", |_: &TaskArgs| Ok(()))
            .kwargs(json!(["verbose", true]))
            .build();
        assert!(matches!(result, Err(TimePlotError::InvalidTask(_))));
    }

    #[test]
    fn test_null_args_mean_empty() {
        let args = TaskArgs::from_values(Some(Value::Null), None).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_error_without_callback_is_swallowed() {
        let task = Task::builder("fails", |_: &TaskArgs| -> Result<()> {
            Err(TimePlotError::Device("boom".to_string()))
        })
        .build()
        .unwrap();

        task.execute();
        assert_eq!(task.runs(), 1);
    }

    #[test]
    fn test_clone_preserves_identity() {
        let task = Task::builder("noop", |_: &TaskArgs| Ok(()))
            .continuous(true)
            .build()
            .unwrap();
        let handle = task.clone();

        assert_eq!(task.id(), handle.id());
        assert!(task.same_task(&handle));
        handle.execute();
        assert_eq!(task.runs(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Task::builder("a", |_: &TaskArgs| Ok(())).build().unwrap();
        let b = Task::builder("b", |_: &TaskArgs| Ok(())).build().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.same_task(&b));
    }
}
