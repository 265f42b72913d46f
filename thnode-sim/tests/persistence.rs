//! Config persistence across restarts, including recovery from a
//! corrupted record.

use thnode_core::TelemetryScheduler;
use thnode_sim::{SimFlash, SimPlatform};

const EUI: [u8; 8] = [0x00, 0x12, 0x4b, 0x00, 0x01, 0x02, 0x03, 0x04];
const PREFIX: [u8; 8] = [0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

#[test]
fn config_survives_restart() {
    let flash = SimFlash::new();

    let mut first = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash.clone(), EUI);
    first.update_config(|cfg| cfg.post_interval_s = 20).unwrap();
    drop(first);

    let second = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash, EUI);
    assert_eq!(second.config().post_interval_s, 20);
}

#[test]
fn corrupted_record_repaired_with_defaults() {
    let flash = SimFlash::new();

    let mut first = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash.clone(), EUI);
    first.update_config(|cfg| cfg.post_interval_s = 20).unwrap();
    drop(first);

    // Flip the first magic byte; the stored record is now unreadable.
    flash.corrupt_byte(0);

    let second = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash.clone(), EUI);
    assert_eq!(second.config().post_interval_s, 10);
    drop(second);

    // Loading repaired the record in place: a third boot reads clean
    // defaults, not corruption.
    let third = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash, EUI);
    assert_eq!(third.config().post_interval_s, 10);
}

#[test]
fn rejected_update_rolls_back() {
    let flash = SimFlash::new();
    let mut node = TelemetryScheduler::new(SimPlatform::joined(PREFIX), flash, EUI);

    assert!(node.update_config(|cfg| cfg.post_interval_s = 0).is_err());
    assert_eq!(node.config().post_interval_s, 10);
}
