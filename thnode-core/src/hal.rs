//! Collaborator interfaces
//!
//! The core never touches hardware or the network stack directly; a board
//! support crate implements [`Platform`] over the real peripherals, and
//! the test harness implements it over scripted state. [`NvStorage`] is
//! split out so the config store can be exercised with nothing but a
//! byte-array flash stub.
//!
//! Completion-style collaborators (transport, name resolution) do not call
//! back into the core. Their outcomes are delivered later as
//! [`SchedulerEvent`](crate::scheduler::SchedulerEvent)s, processed
//! synchronously on the cooperative loop.

use crate::constants::MAX_PULSE_SAMPLES;
use crate::errors::{StorageError, TransportError};
use crate::report::ReportRequest;
use crate::time::Timestamp;

/// A mesh-layer address, sixteen bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeAddr(pub [u8; 16]);

impl NodeAddr {
    /// The all-zero address, used as "not configured" in stored records.
    pub const UNSPECIFIED: NodeAddr = NodeAddr([0; 16]);

    /// Default sink for a given mesh prefix: the prefix with a host part
    /// of `::1`.
    pub fn sink_for_prefix(prefix: &[u8; 8]) -> Self {
        let mut addr = [0u8; 16];
        addr[..8].copy_from_slice(prefix);
        addr[15] = 1;
        NodeAddr(addr)
    }

    /// True unless this is the all-zero placeholder.
    pub fn is_specified(&self) -> bool {
        self.0.iter().any(|&b| b != 0)
    }
}

/// What the mesh layer reports about the current join state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingInfo {
    /// The 64-bit routing prefix of the joined mesh.
    pub prefix: [u8; 8],
}

/// The scheduler's one-shot timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    /// Periodic wake-cycle timer.
    Post,
    /// Short back-off between acquisition attempts.
    SensorRetry,
    /// Awake window after an unconfirmed report.
    SleepAfterPost,
    /// Power-on window after which sleeping becomes permitted.
    PowerWake,
}

/// Facade over everything the board provides: clock, timers, mesh, radio
/// transport, sensor line, capture peripheral, power rails and recovery
/// primitives.
///
/// All methods are infallible except where a failure is meaningful to the
/// caller; board crates are expected to absorb or panic on conditions the
/// core could not react to anyway.
pub trait Platform {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> Timestamp;

    /// Arm (or re-arm) a one-shot timer `after_ms` from now. Firing is
    /// delivered as a `TimerFired` scheduler event.
    fn arm_timer(&mut self, id: TimerId, after_ms: u64);

    /// Cancel a timer if armed; a cancelled timer never fires.
    fn cancel_timer(&mut self, id: TimerId);

    /// Current mesh join state, `None` while not joined.
    fn mesh_joined(&mut self) -> Option<RoutingInfo>;

    /// Begin resolving a sink hostname. The outcome arrives as a
    /// `ResolutionDone` scheduler event.
    fn start_resolve(&mut self, host: &str);

    /// Submit one report for delivery. Delivery outcome (for both modes)
    /// arrives as a `TransportComplete` scheduler event.
    fn send_report(&mut self, request: &ReportRequest<'_>) -> Result<(), TransportError>;

    /// Battery voltage in millivolts.
    fn battery_mv(&mut self) -> u16;

    /// Drive the sensor data line low.
    fn line_low(&mut self);

    /// Put the sensor data line in high-impedance with pull-up, letting
    /// the sensor drive it.
    fn line_release(&mut self);

    /// Drive the sensor data line high (idle state).
    fn line_high(&mut self);

    /// Start edge capture into the pulse buffer.
    fn capture_arm(&mut self);

    /// Stop edge capture. After this returns the interrupt producer is
    /// quiescent and the buffer may be read.
    fn capture_disarm(&mut self);

    /// Discard any previously captured window. Only valid while disarmed.
    fn capture_reset(&mut self);

    /// Copy the captured window into `out`, returning the sample count.
    /// Only valid while disarmed.
    fn capture_snapshot(&mut self, out: &mut [u16; MAX_PULSE_SAMPLES]) -> usize;

    /// Busy-wait (or cooperatively wait) for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Switch the sensor supply rail on or off.
    fn sensor_power(&mut self, on: bool);

    /// Select whether the boost converter stays enabled through sleep.
    fn hold_boost_in_sleep(&mut self, on: bool);

    /// Suspend the processor for `ms` milliseconds. The monotonic clock
    /// keeps counting across the suspension.
    fn sleep_for_ms(&mut self, ms: u64);

    /// Unconditional hardware reset. Does not return on real hardware.
    fn reboot(&mut self);

    /// Tear down and re-establish the mesh join.
    fn rejoin_mesh(&mut self);
}

/// Fixed-region persistent storage for the config record.
pub trait NvStorage {
    /// Erase the whole region.
    fn erase(&mut self) -> Result<(), StorageError>;

    /// Write `bytes` at the start of the (erased) region.
    fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read up to `out.len()` bytes from the start of the region,
    /// returning how many were available.
    fn read(&mut self, out: &mut [u8]) -> Result<usize, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_for_prefix_appends_host_one() {
        let addr = NodeAddr::sink_for_prefix(&[0xaa, 0xaa, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.0[..8], [0xaa, 0xaa, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.0[8..], [0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(addr.is_specified());
    }

    #[test]
    fn unspecified_addr() {
        assert!(!NodeAddr::UNSPECIFIED.is_specified());
    }
}
