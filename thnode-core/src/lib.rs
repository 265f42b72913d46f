//! Core firmware logic for thnode
//!
//! thnode is a battery-powered, mesh-networked temperature/humidity sensor
//! node. This crate holds everything between the interrupt handler and the
//! radio driver: pulse-width signal decoding, the acquisition sequence,
//! persisted configuration, report composition, the sleep policy, and the
//! telemetry scheduler that ties them together.
//!
//! Key constraints:
//! - No heap allocation anywhere
//! - Hardware reached only through the [`hal::Platform`] and
//!   [`hal::NvStorage`] traits, so the whole core runs on a host
//! - Single cooperative loop; the edge-capture interrupt handler is the
//!   only concurrent code and only ever touches [`capture::PulseBuffer`]
//!
//! ```
//! use thnode_core::decode::decode;
//!
//! // Leading marker, then 40 pulse widths, one per frame bit.
//! // Short pulses decode to 0, long pulses to 1.
//! let mut samples = [40u16; 41];
//! samples[3] = 120; // bit 2 of the humidity integer byte
//! let frame = decode(&samples);
//! assert_eq!(frame.bytes()[0], 0b0010_0000);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod acquire;
pub mod capture;
pub mod config;
pub mod constants;
pub mod decode;
pub mod errors;
pub mod frame;
pub mod hal;
mod logging;
pub mod payload;
pub mod report;
pub mod scheduler;
pub mod sleep;
pub mod time;

// Public API
pub use config::{ConfigStore, NodeConfig};
pub use errors::{AcquireError, ConfigError, StorageError, TransportError};
pub use frame::{SensorFrame, SensorReading};
pub use hal::{NodeAddr, NvStorage, Platform, RoutingInfo, TimerId};
pub use report::{DeliveryMode, ReportRequest};
pub use scheduler::{
    Phase, ResolutionStatus, ResolveOutcome, SchedulerEvent, SchedulerState, TelemetryScheduler,
};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
