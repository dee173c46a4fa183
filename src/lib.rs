//! # TimePlot-RS: threaded sampling of slow devices into a live plot
//!
//! Each plotted line is backed by a device (anything that can produce a
//! numeric value on demand) that is polled on its own worker thread. Values
//! travel to the UI thread over a bounded channel, and every sample waits
//! for the UI to acknowledge it before the next one is taken, so a slow UI
//! throttles its producers instead of piling up samples.
//!
//! ## Architecture
//!
//! - **Backend**: task queues, worker threads, device proxies and the
//!   per-line sampling state machine
//! - **Pipeline**: owns one sampling worker per line plus the event bridge
//! - **Session**: line buffers on the UI thread and their JSON persistence
//! - **Frontend**: eframe/egui window with egui_plot rendering
//!
//! ## Configuration
//!
//! Settings and stored line data live in the platform data directory under
//! `dev.timeplot.timeplot-rs`:
//!
//! - **Linux**: `~/.local/share/dev.timeplot.timeplot-rs/`
//! - **macOS**: `~/Library/Application Support/dev.timeplot.timeplot-rs/`
//! - **Windows**: `%APPDATA%\dev.timeplot.timeplot-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use timeplot_rs::{
//!     backend::{SignalDevice, SignalForm},
//!     config::{AppConfig, PersistenceConfig},
//!     pipeline::TimePlotPipeline,
//!     session::TimePlotData,
//! };
//!
//! let config = AppConfig::default();
//! let mut pipeline = TimePlotPipeline::new(config.sampling.clone());
//! let mut data = TimePlotData::new(None, &PersistenceConfig::default());
//!
//! let line = pipeline.add_line(SignalDevice::new(SignalForm::Sin))?;
//! data.add_line(line);
//! pipeline.start(line)?;
//!
//! loop {
//!     for event in pipeline.drain_events() {
//!         data.handle_event(event);
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod frontend;
pub mod pipeline;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use backend::{Device, DeviceProxy, SamplingWorker, Task, TaskQueue, WorkerThread};
pub use config::AppConfig;
pub use error::{Result, TimePlotError};
pub use frontend::TimePlotApp;
pub use pipeline::{PipelineEvent, TimePlotPipeline};
pub use session::TimePlotData;
pub use types::{LineId, LineStats, SamplingState};
