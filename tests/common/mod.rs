//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::{Duration, Instant};
use timeplot_rs::pipeline::TimePlotPipeline;
use timeplot_rs::session::TimePlotData;

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Poll `condition` every millisecond until it holds; panics after [`test_timeout`]
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + test_timeout();
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Play the UI thread: feed events into `data` until `done` holds
pub fn pump_until(
    pipeline: &TimePlotPipeline,
    data: &mut TimePlotData,
    mut done: impl FnMut(&TimePlotData) -> bool,
) {
    let deadline = Instant::now() + test_timeout();
    while !done(data) {
        assert!(Instant::now() < deadline, "pipeline did not deliver in time");
        if let Some(event) = pipeline.recv_event_timeout(Duration::from_millis(10)) {
            data.handle_event(event);
        }
    }
}

/// Feed every queued event into `data`
pub fn pump_pending(pipeline: &TimePlotPipeline, data: &mut TimePlotData) -> usize {
    let events = pipeline.drain_events();
    let count = events.len();
    for event in events {
        data.handle_event(event);
    }
    count
}
