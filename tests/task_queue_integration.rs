//! Integration tests for task queues and worker threads

mod common;

use common::wait_until;
use proptest::prelude::*;
use serde_json::json;
use serial_test::serial;
use std::any::Any;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use timeplot_rs::backend::{Task, TaskQueue, WorkerThread};
use timeplot_rs::error::TimePlotError;

fn recording_task(label: &str, log: &Arc<Mutex<Vec<u64>>>, value: u64) -> Task {
    let log = log.clone();
    Task::builder(label, move |_| {
        log.lock().unwrap().push(value);
        Ok(())
    })
    .build()
    .unwrap()
}

#[test]
fn test_non_task_is_rejected_and_queue_unchanged() {
    let queue = TaskQueue::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    queue.enqueue(recording_task("first", &log, 1));
    assert_eq!(queue.len(), 1);

    let items: Vec<Box<dyn Any + Send>> = vec![
        Box::new(42u32),
        Box::new("not a task".to_string()),
        Box::new(json!({"func": "get_value"})),
    ];
    for item in items {
        let result = queue.enqueue_any(item);
        assert!(matches!(result, Err(TimePlotError::InvalidTask(_))));
        assert_eq!(queue.len(), 1);
    }

    queue
        .enqueue_any(Box::new(recording_task("second", &log, 2)))
        .unwrap();
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_bad_argument_containers_are_rejected() {
    let build = |args: serde_json::Value, kwargs: serde_json::Value| {
        Task::builder("bad", |_| Ok(()))
            .args(args)
            .kwargs(kwargs)
            .build()
    };

    assert!(matches!(
        build(json!({"a": 1}), json!(null)),
        Err(TimePlotError::InvalidTask(_))
    ));
    assert!(matches!(
        build(json!([]), json!([1, 2])),
        Err(TimePlotError::InvalidTask(_))
    ));
    assert!(build(json!([1, "two"]), json!({"three": 3})).is_ok());
}

#[test]
#[serial]
fn test_continuous_and_one_shot_tasks_share_a_worker() {
    let queue = TaskQueue::new();
    let worker = WorkerThread::new(queue.clone(), Duration::from_millis(1));
    let log = Arc::new(Mutex::new(Vec::new()));

    let ticks = Task::builder("ticker", |_| Ok(()))
        .continuous(true)
        .build()
        .unwrap();
    queue.enqueue(ticks.clone());
    worker.start().unwrap();

    wait_until(|| ticks.runs() >= 10);
    queue.enqueue(recording_task("one-shot", &log, 7));
    wait_until(|| !log.lock().unwrap().is_empty());

    worker.stop().unwrap();
    worker.join();

    assert_eq!(*log.lock().unwrap(), vec![7]);
    // The continuous task is still queued for the next start
    assert!(queue.contains(&ticks));
    assert!(!worker.is_alive());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// One-shot tasks run exactly once each, in enqueue order
    #[test]
    fn prop_tasks_run_in_fifo_order(values in prop::collection::vec(any::<u64>(), 1..40)) {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (i, value) in values.iter().enumerate() {
            queue.enqueue(recording_task(&format!("task-{}", i), &log, *value));
        }

        let worker = WorkerThread::new(queue.clone(), Duration::from_millis(1));
        worker.start().unwrap();
        wait_until(|| log.lock().unwrap().len() == values.len());
        worker.stop().unwrap();
        worker.join();

        prop_assert_eq!(&*log.lock().unwrap(), &values);
        prop_assert!(queue.is_empty());
    }
}
