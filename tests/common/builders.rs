//! Test data builders for creating test objects

use std::time::Duration;
use timeplot_rs::config::{PersistenceConfig, SamplingConfig};
use timeplot_rs::session::LineSnapshot;

/// Builder for sampling configs with test-friendly timings
pub struct SamplingConfigBuilder {
    config: SamplingConfig,
}

impl SamplingConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SamplingConfig {
                pause_slice_ms: 10,
                fault_backoff_ms: 10,
                ..SamplingConfig::default()
            },
        }
    }

    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn build(self) -> SamplingConfig {
        self.config
    }
}

/// Persistence config that neither autosaves nor recalls
pub fn manual_persistence() -> PersistenceConfig {
    PersistenceConfig {
        autosave: false,
        recall_on_startup: false,
        ..PersistenceConfig::default()
    }
}

/// Snapshot with evenly spaced times
pub fn snapshot(values: &[f64], step: f64, absolute_time: f64) -> LineSnapshot {
    LineSnapshot {
        t: (0..values.len()).map(|i| i as f64 * step).collect(),
        y: values.to_vec(),
        absolute_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_config_builder() {
        let config = SamplingConfigBuilder::new()
            .ack_timeout(Duration::from_millis(150))
            .channel_capacity(4)
            .build();

        assert_eq!(config.ack_timeout(), Duration::from_millis(150));
        assert_eq!(config.event_channel_capacity, 4);
        assert_eq!(config.pause_slice(), Duration::from_millis(10));
    }
}
