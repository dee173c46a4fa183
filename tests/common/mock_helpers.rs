//! Devices with observable behavior for integration tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use timeplot_rs::backend::Device;
use timeplot_rs::error::Result;

/// Returns `base`, `base + 1`, `base + 2`... and counts its reads
pub struct CountingDevice {
    name: String,
    base: f64,
    reads: Arc<AtomicU64>,
}

impl CountingDevice {
    pub fn new(name: &str, base: f64) -> (Self, Arc<AtomicU64>) {
        let reads = Arc::new(AtomicU64::new(0));
        let device = Self {
            name: name.to_string(),
            base,
            reads: reads.clone(),
        };
        (device, reads)
    }
}

impl Device for CountingDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn get_value(&mut self) -> Result<f64> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.base + n as f64)
    }
}

/// Records the name of every thread that reads it
pub struct ThreadRecordingDevice {
    threads: Arc<Mutex<Vec<Option<String>>>>,
}

impl ThreadRecordingDevice {
    pub fn new() -> (Self, Arc<Mutex<Vec<Option<String>>>>) {
        let threads = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                threads: threads.clone(),
            },
            threads,
        )
    }
}

impl Device for ThreadRecordingDevice {
    fn name(&self) -> String {
        "thread-recorder".to_string()
    }

    fn get_value(&mut self) -> Result<f64> {
        let name = std::thread::current().name().map(str::to_string);
        let mut threads = self.threads.lock().unwrap();
        threads.push(name);
        Ok(threads.len() as f64)
    }
}
