//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{snapshot, SamplingConfigBuilder};
use common::mock_helpers::CountingDevice;
use std::time::Duration;
use timeplot_rs::backend::Device;

#[test]
fn test_infrastructure_setup() {
    let config = SamplingConfigBuilder::new()
        .ack_timeout(Duration::from_millis(250))
        .build();
    assert_eq!(config.ack_timeout(), Duration::from_millis(250));

    let (mut device, reads) = CountingDevice::new("counter", 10.0);
    assert_eq!(device.get_value().unwrap(), 10.0);
    assert_eq!(device.get_value().unwrap(), 11.0);
    assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 2);

    let s = snapshot(&[1.0, 2.0, 3.0], 0.5, 7.0);
    assert_eq!(s.t, vec![0.0, 0.5, 1.0]);
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}
