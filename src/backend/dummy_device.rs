//! Simulated devices
//!
//! These devices stand in for real hardware so the plotter can be run and
//! tested without anything attached.
//!
//! # Signal Forms
//!
//! [`SignalDevice`] generates a value from the wall clock on every read:
//!
//! - [`SignalForm::Random`] - uniform random value in `[xmin, xmax)`
//! - [`SignalForm::Sawtooth`] - ramp from `xmin` wrapping after `xmax - xmin`
//! - [`SignalForm::Sin`] - sine of amplitude `xmax - xmin`
//! - [`SignalForm::XSin`] - sine whose amplitude grows with elapsed time
//! - [`SignalForm::Linear`] - seconds elapsed since construction
//! - [`SignalForm::SinX`] - sine whose amplitude decays with elapsed time
//!
//! [`SequenceDevice`] replays a fixed list of readings once each.
//!
//! # Example
//!
//! ```ignore
//! use timeplot_rs::backend::dummy_device::{SignalDevice, SignalForm};
//!
//! let mut device = SignalDevice::new(SignalForm::Sin)
//!     .with_frequency(0.5)
//!     .with_range(-1.0, 1.0);
//! let value = device.get_value()?;
//! ```

use super::device::{Device, MemberKind, GET_VALUE};
use super::task::TaskArgs;
use crate::error::{Result, TimePlotError};
use crate::types::wall_clock_seconds;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Waveform produced by a [`SignalDevice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalForm {
    Random,
    #[default]
    Sawtooth,
    Sin,
    #[serde(rename = "xsin")]
    XSin,
    Linear,
    #[serde(rename = "sinx")]
    SinX,
}

impl SignalForm {
    /// All supported forms
    pub const ALL: [SignalForm; 6] = [
        SignalForm::Random,
        SignalForm::Sawtooth,
        SignalForm::Sin,
        SignalForm::XSin,
        SignalForm::Linear,
        SignalForm::SinX,
    ];

    /// Name used in configuration files and by `set_signal_form`
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalForm::Random => "random",
            SignalForm::Sawtooth => "sawtooth",
            SignalForm::Sin => "sin",
            SignalForm::XSin => "xsin",
            SignalForm::Linear => "linear",
            SignalForm::SinX => "sinx",
        }
    }
}

impl fmt::Display for SignalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalForm {
    type Err = TimePlotError;

    fn from_str(s: &str) -> Result<Self> {
        SignalForm::ALL
            .into_iter()
            .find(|form| form.as_str() == s)
            .ok_or_else(|| TimePlotError::Device(format!("unknown signal form '{}'", s)))
    }
}

/// Signal generator device
#[derive(Debug, Clone)]
pub struct SignalDevice {
    name: String,
    form: SignalForm,
    frequency: f64,
    xmin: f64,
    xmax: f64,
    /// Wall-clock origin for the time-dependent forms
    time0: f64,
}

impl SignalDevice {
    /// Create a generator with frequency 0.1 over `[-1, 1]`
    pub fn new(form: SignalForm) -> Self {
        Self {
            name: format!("{}-signal", form),
            form,
            frequency: 0.1,
            xmin: -1.0,
            xmax: 1.0,
            time0: wall_clock_seconds(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_range(mut self, xmin: f64, xmax: f64) -> Self {
        self.xmin = xmin;
        self.xmax = xmax;
        self
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    pub fn signal_form(&self) -> SignalForm {
        self.form
    }

    pub fn set_signal_form(&mut self, form: SignalForm) {
        self.form = form;
    }

    /// Value of the signal at wall-clock time `now` (seconds since the epoch)
    pub fn value_at(&self, now: f64) -> f64 {
        let dx = self.xmax - self.xmin;
        let elapsed = now - self.time0;
        match self.form {
            SignalForm::Random => self.xmin + dx * rand_simple(),
            SignalForm::Sawtooth => {
                if dx == 0.0 {
                    self.xmin
                } else {
                    self.xmin + (now * self.frequency).rem_euclid(dx)
                }
            }
            SignalForm::Sin => dx * (now * self.frequency).sin(),
            SignalForm::XSin => elapsed * dx * (now * self.frequency).sin(),
            SignalForm::Linear => elapsed,
            SignalForm::SinX => dx * (now * self.frequency).sin() / elapsed,
        }
    }
}

impl Device for SignalDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn get_value(&mut self) -> Result<f64> {
        Ok(self.value_at(wall_clock_seconds()))
    }

    fn member_kind(&self, name: &str) -> Option<MemberKind> {
        match name {
            GET_VALUE | "set_frequency" | "get_frequency" | "set_signal_form" => {
                Some(MemberKind::Method)
            }
            "frequency" | "xmin" | "xmax" | "signal_form" => Some(MemberKind::Attribute),
            _ => None,
        }
    }

    fn call_method(&mut self, name: &str, args: &TaskArgs) -> Result<Value> {
        match name {
            GET_VALUE => {
                let value = self.get_value()?;
                let verbose = args
                    .get(0, "verbose")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if verbose {
                    tracing::info!(device = %self.name, "{}", value);
                }
                Ok(Value::from(value))
            }
            "set_frequency" => {
                let frequency = args.get(0, "f").and_then(Value::as_f64).ok_or_else(|| {
                    TimePlotError::Device("set_frequency expects a numeric argument".to_string())
                })?;
                self.set_frequency(frequency);
                Ok(Value::Null)
            }
            "get_frequency" => Ok(Value::from(self.frequency)),
            "set_signal_form" => {
                let form = args
                    .get(0, "signal_form")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        TimePlotError::Device(
                            "set_signal_form expects a string argument".to_string(),
                        )
                    })?
                    .parse()?;
                self.set_signal_form(form);
                Ok(Value::Null)
            }
            _ => Err(TimePlotError::AttributeNotFound {
                device: self.name(),
                member: name.to_string(),
            }),
        }
    }

    fn read_attribute(&self, name: &str) -> Result<Value> {
        match name {
            "frequency" => Ok(Value::from(self.frequency)),
            "xmin" => Ok(Value::from(self.xmin)),
            "xmax" => Ok(Value::from(self.xmax)),
            "signal_form" => Ok(Value::from(self.form.as_str())),
            _ => Err(TimePlotError::AttributeNotFound {
                device: self.name(),
                member: name.to_string(),
            }),
        }
    }
}

/// Simple pseudo-random number generator in `[0, 1)`
fn rand_simple() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static SEED: Cell<u64> = const { Cell::new(0x9E37_79B9_7F4A_7C15) };
    }
    SEED.with(|seed| {
        let mut s = seed.get();
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        seed.set(s);
        (s >> 11) as f64 / (1u64 << 53) as f64
    })
}

/// Device that replays fixed readings once each, then fails
#[derive(Debug, Clone)]
pub struct SequenceDevice {
    name: String,
    values: VecDeque<f64>,
    delay: Option<Duration>,
}

impl SequenceDevice {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            name: "sequence".to_string(),
            values: values.into_iter().collect(),
            delay: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep this long inside every read
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Readings not yet returned
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl Device for SequenceDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn get_value(&mut self) -> Result<f64> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.values
            .pop_front()
            .ok_or_else(|| TimePlotError::Device("sequence exhausted".to_string()))
    }

    fn member_kind(&self, name: &str) -> Option<MemberKind> {
        match name {
            GET_VALUE => Some(MemberKind::Method),
            "remaining" => Some(MemberKind::Attribute),
            _ => None,
        }
    }

    fn read_attribute(&self, name: &str) -> Result<Value> {
        match name {
            "remaining" => Ok(Value::from(self.remaining())),
            _ => Err(TimePlotError::AttributeNotFound {
                device: self.name(),
                member: name.to_string(),
            }),
        }
    }
}
