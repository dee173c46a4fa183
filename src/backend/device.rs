//! Device trait for the polled data sources
//!
//! Every line on the plot is fed by one device. A device exposes a
//! `get_value` method that returns the next reading, plus any number of named
//! methods (setters, getters) and attributes that a [`DeviceProxy`] can
//! dispatch to by name, either directly or through the proxy's worker queue.
//!
//! Implementations must be `Send`; they are moved into a [`SharedDevice`]
//! and accessed from the worker thread and, while the worker is stopped,
//! from the caller's thread.
//!
//! [`DeviceProxy`]: super::device_proxy::DeviceProxy

use super::task::TaskArgs;
use crate::error::{Result, TimePlotError};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Name of the value accessor every device provides
pub const GET_VALUE: &str = "get_value";

/// What a named device member is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// Invocable with arguments
    Method,
    /// Plain readable value
    Attribute,
}

/// A device shared between its proxy and the proxy's worker thread
pub type SharedDevice = Arc<Mutex<Box<dyn Device>>>;

/// Wrap a device for sharing
pub fn shared(device: impl Device + 'static) -> SharedDevice {
    Arc::new(Mutex::new(Box::new(device)))
}

/// Unified interface for polled devices
///
/// The defaults describe a device that only knows `get_value`.
///
/// # Example
///
/// ```ignore
/// fn poll(device: &mut dyn Device) -> Result<f64> {
///     device.get_value()
/// }
/// ```
pub trait Device: Send {
    /// Display name, used in logs and errors
    fn name(&self) -> String;

    /// Take the next reading
    fn get_value(&mut self) -> Result<f64>;

    /// Kind of the member called `name`, or `None` if there is no such member
    fn member_kind(&self, name: &str) -> Option<MemberKind> {
        (name == GET_VALUE).then_some(MemberKind::Method)
    }

    /// Invoke the method called `name`
    fn call_method(&mut self, name: &str, _args: &TaskArgs) -> Result<Value> {
        if name == GET_VALUE {
            return self.get_value().map(Value::from);
        }
        Err(TimePlotError::AttributeNotFound {
            device: self.name(),
            member: name.to_string(),
        })
    }

    /// Read the attribute called `name`
    fn read_attribute(&self, name: &str) -> Result<Value> {
        Err(TimePlotError::AttributeNotFound {
            device: self.name(),
            member: name.to_string(),
        })
    }
}

/// Convert a dynamic method result back into a reading
///
/// Non-finite readings are encoded as JSON `null`, which is read back as NaN.
pub fn value_as_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(f64::NAN),
        other => other.as_f64().ok_or_else(|| {
            TimePlotError::Device(format!("expected a numeric reading, got {}", other))
        }),
    }
}
