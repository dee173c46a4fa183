//! Error handling for timeplot-rs
//!
//! This module defines the crate error type and a Result alias used
//! throughout the library. Lifecycle and construction errors are returned
//! synchronously to the caller; runtime sampling errors happen on worker
//! threads and reach the UI as [`PipelineEvent::Fault`](crate::pipeline::PipelineEvent).

use crate::types::LineId;
use std::time::Duration;
use thiserror::Error;

/// Main error type for timeplot-rs operations
#[derive(Error, Debug)]
pub enum TimePlotError {
    /// Malformed task construction or a non-task item pushed to a queue
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The wrapped device has no member with this name
    #[error("Device '{device}' has no member '{member}'")]
    AttributeNotFound { device: String, member: String },

    /// A start request hit something that is already running
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// A stop/pause/restart request hit something that is not running
    #[error("Not running: {0}")]
    NotRunning(String),

    /// The UI did not acknowledge a sample in time
    #[error("Line {line_id} stalled: sample not acknowledged within {waited:?}")]
    SamplingStall { line_id: LineId, waited: Duration },

    /// No line with this id exists
    #[error("Unknown line {0}")]
    UnknownLine(LineId),

    /// A proxied device call did not complete in time
    #[error("Call to '{member}' timed out after {timeout:?}")]
    CallTimeout { member: String, timeout: Duration },

    /// Errors raised by a device implementation
    #[error("Device error: {0}")]
    Device(String),

    /// Inconsistent buffer data (e.g. mismatched array lengths)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TimePlotError>,
    },
}

impl TimePlotError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TimePlotError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &TimePlotError {
        match self {
            TimePlotError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for TimePlotError {
    fn from(err: serde_json::Error) -> Self {
        TimePlotError::Serialization(err.to_string())
    }
}

/// Result type alias for timeplot-rs operations
pub type Result<T> = std::result::Result<T, TimePlotError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimePlotError::InvalidTask("args must be a list".to_string());
        assert_eq!(err.to_string(), "Invalid task: args must be a list");
    }

    #[test]
    fn test_error_with_context() {
        let err = TimePlotError::Device("sensor offline".to_string());
        let with_ctx = err.with_context("Failed to sample line 3");
        assert!(with_ctx.to_string().contains("Failed to sample line 3"));
        assert!(matches!(with_ctx.root(), TimePlotError::Device(_)));
    }

    #[test]
    fn test_attribute_not_found_names_member() {
        let err = TimePlotError::AttributeNotFound {
            device: "dummy".to_string(),
            member: "set_gain".to_string(),
        };
        assert!(err.to_string().contains("dummy"));
        assert!(err.to_string().contains("set_gain"));
    }

    #[test]
    fn test_stall_mentions_line() {
        let err = TimePlotError::SamplingStall {
            line_id: LineId(4),
            waited: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("Line 4"));
    }
}
