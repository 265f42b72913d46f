//! Shared fixtures for the simulation tests.

use thnode_sim::{pulse_train, SimFlash, SimPlatform};
use thnode_core::TelemetryScheduler;

/// Device EUI used across the tests.
pub const EUI: [u8; 8] = [0x00, 0x12, 0x4b, 0x00, 0x01, 0x02, 0x03, 0x04];

/// Mesh prefix the simulated network advertises.
pub const PREFIX: [u8; 8] = [0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Payload for the reference reading (53.0% / 18.0 C), no battery field.
pub const GOOD_BODY: &str = "{\"eui\":\"00124b0001020304\",\"t\":\" 18.0C\",\"h\":\"53.0%\"}";

/// Pulse train for the reference reading.
pub fn good_train() -> Vec<u16> {
    pulse_train(&[0x35, 0x00, 0x12, 0x00, 0x47], 40)
}

/// Started node on the given platform with empty flash.
pub fn node(platform: SimPlatform) -> TelemetryScheduler<SimPlatform, SimFlash> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut node = TelemetryScheduler::new(platform, SimFlash::new(), EUI);
    node.start();
    node
}
