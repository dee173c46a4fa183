//! Configuration module for timeplot-rs
//!
//! This module handles application configuration:
//! - Sampling timings (worker yield, acknowledgement and call timeouts)
//! - Data persistence (autosave cadence, startup recall/clear)
//! - The lines to plot and the simulated device behind each
//! - UI preferences
//!
//! # App Data Location
//!
//! Configuration and recorded data live in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.timeplot.timeplot-rs/`
//! - **macOS**: `~/Library/Application Support/dev.timeplot.timeplot-rs/`
//! - **Windows**: `%APPDATA%\dev.timeplot.timeplot-rs\`
//!
//! # Files
//!
//! - `timeplot.json` - Application configuration
//! - `timeplot_data.json` - Recorded line data, keyed `data_{id}`
//!
//! # Example
//!
//! ```ignore
//! use timeplot_rs::config::AppConfig;
//!
//! let config = AppConfig::load_or_default(AppConfig::default_path()?);
//! for line in &config.lines {
//!     println!("{} -> {}", line.name, line.device.signal_form);
//! }
//! ```

use crate::backend::dummy_device::{SignalDevice, SignalForm};
use crate::error::{Result, TimePlotError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "dev.timeplot.timeplot-rs";

/// Configuration filename
pub const CONFIG_FILE: &str = "timeplot.json";

/// Recorded data filename
pub const DATA_FILE: &str = "timeplot_data.json";

/// Default sleep between worker-thread iterations in milliseconds
pub const DEFAULT_YIELD_INTERVAL_MS: u64 = 1;

/// Default time a producer waits for a sample to be acknowledged
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2000;

/// Default time a proxied device call may take while the worker runs
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5000;

/// Default slice a paused sampling task blocks before yielding its worker
pub const DEFAULT_PAUSE_SLICE_MS: u64 = 50;

/// Default delay after a device error before sampling again
pub const DEFAULT_FAULT_BACKOFF_MS: u64 = 100;

/// Default number of appended points between autosaves
pub const DEFAULT_AUTOSAVE_EVERY: usize = 30;

/// Allowed autosave cadence
pub const AUTOSAVE_EVERY_RANGE: std::ops::RangeInclusive<usize> = 10..=1000;

/// Default capacity of the worker-to-UI event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        TimePlotError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            TimePlotError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

// ==================== App Config ====================

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Sampling and handshake timings
    pub sampling: SamplingConfig,

    /// Data persistence
    pub persistence: PersistenceConfig,

    /// Lines to plot, one simulated device each
    pub lines: Vec<LineConfig>,

    /// UI preferences
    pub ui: UiConfig,
}

impl AppConfig {
    /// Path of the configuration file in the app data directory
    pub fn default_path() -> Result<PathBuf> {
        app_data_dir()
            .map(|p| p.join(CONFIG_FILE))
            .ok_or_else(|| TimePlotError::Config("Could not determine config path".to_string()))
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TimePlotError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            TimePlotError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load a configuration file, falling back to [`AppConfig::sample`]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {:?}, using sample configuration", path);
            return Self::sample();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::sample()
        })
    }

    /// Save the configuration to disk as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TimePlotError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TimePlotError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            TimePlotError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Create a sample configuration with three simulated lines
    pub fn sample() -> Self {
        Self {
            lines: vec![
                LineConfig::new(
                    "random",
                    DeviceConfig {
                        signal_form: SignalForm::Random,
                        frequency: 5.0,
                        xmin: 0.0,
                        xmax: 2.0,
                    },
                ),
                LineConfig::new(
                    "sawtooth",
                    DeviceConfig {
                        frequency: 0.6,
                        ..DeviceConfig::default()
                    },
                ),
                LineConfig::new(
                    "sin",
                    DeviceConfig {
                        signal_form: SignalForm::Sin,
                        frequency: 1.3,
                        ..DeviceConfig::default()
                    },
                ),
            ],
            ..Self::default()
        }
    }
}

// ==================== Sampling Config ====================

/// Timing parameters of the sampling pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sleep between worker-thread iterations
    pub yield_interval_ms: u64,

    /// How long a producer waits for the UI to acknowledge a sample
    pub ack_timeout_ms: u64,

    /// How long a proxied call may wait for the worker to run it
    pub call_timeout_ms: u64,

    /// Maximum time a paused sampling task blocks its worker per iteration
    pub pause_slice_ms: u64,

    /// Delay after a device error
    pub fault_backoff_ms: u64,

    /// Capacity of the worker-to-UI event channel
    pub event_channel_capacity: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            yield_interval_ms: DEFAULT_YIELD_INTERVAL_MS,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            pause_slice_ms: DEFAULT_PAUSE_SLICE_MS,
            fault_backoff_ms: DEFAULT_FAULT_BACKOFF_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl SamplingConfig {
    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn pause_slice(&self) -> Duration {
        Duration::from_millis(self.pause_slice_ms.max(1))
    }

    pub fn fault_backoff(&self) -> Duration {
        Duration::from_millis(self.fault_backoff_ms)
    }
}

// ==================== Persistence Config ====================

/// Data persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Write a line to the data file every `autosave_every` points
    pub autosave: bool,

    /// Autosave cadence in points (10..=1000)
    pub autosave_every: usize,

    /// Reload stored lines at startup
    pub recall_on_startup: bool,

    /// Start with empty lines even if stored data exists
    pub clear_on_startup: bool,

    /// Data file location (defaults to the app data directory)
    pub data_file: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            autosave: true,
            autosave_every: DEFAULT_AUTOSAVE_EVERY,
            recall_on_startup: true,
            clear_on_startup: false,
            data_file: None,
        }
    }
}

impl PersistenceConfig {
    /// Set the autosave cadence, clamped to [`AUTOSAVE_EVERY_RANGE`]
    pub fn set_autosave_every(&mut self, every: usize) {
        self.autosave_every = every.clamp(*AUTOSAVE_EVERY_RANGE.start(), *AUTOSAVE_EVERY_RANGE.end());
    }

    /// Effective autosave cadence, or `None` when autosave is off
    pub fn autosave_cadence(&self) -> Option<usize> {
        self.autosave.then(|| {
            self.autosave_every
                .clamp(*AUTOSAVE_EVERY_RANGE.start(), *AUTOSAVE_EVERY_RANGE.end())
        })
    }

    /// Resolved data file path
    pub fn data_path(&self) -> Result<PathBuf> {
        match &self.data_file {
            Some(path) => Ok(path.clone()),
            None => app_data_dir().map(|p| p.join(DATA_FILE)).ok_or_else(|| {
                TimePlotError::Config("Could not determine data file path".to_string())
            }),
        }
    }
}

// ==================== Line Config ====================

/// One plotted line
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LineConfig {
    /// Display name / legend label
    pub name: String,

    /// Simulated device feeding the line
    pub device: DeviceConfig,
}

impl LineConfig {
    pub fn new(name: impl Into<String>, device: DeviceConfig) -> Self {
        Self {
            name: name.into(),
            device,
        }
    }
}

/// Parameters of a simulated signal device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub signal_form: SignalForm,
    pub frequency: f64,
    pub xmin: f64,
    pub xmax: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            signal_form: SignalForm::Sawtooth,
            frequency: 0.1,
            xmin: -1.0,
            xmax: 1.0,
        }
    }
}

impl DeviceConfig {
    /// Instantiate the device
    pub fn build(&self, name: &str) -> SignalDevice {
        SignalDevice::new(self.signal_form)
            .with_name(name)
            .with_frequency(self.frequency)
            .with_range(self.xmin, self.xmax)
    }
}

// ==================== UI Config ====================

/// UI configuration for plotting and display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Visible time window in seconds (follow mode)
    pub time_window_seconds: f64,

    /// Keep the newest samples in view
    pub follow_latest: bool,

    /// Show grid on the plot
    pub show_grid: bool,

    /// Show legend on the plot
    pub show_legend: bool,

    /// Plot line width in pixels
    pub line_width: f32,

    /// Start sampling every line when the window opens
    pub start_on_launch: bool,

    /// Also write logs to a daily rolling file in the app data directory
    pub log_to_file: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 30.0,
            follow_latest: true,
            show_grid: true,
            show_legend: true,
            line_width: 1.5,
            start_on_launch: false,
            log_to_file: false,
        }
    }
}
