//! Compile-time constants for the sensor protocol, power policy and network
//! defaults
//!
//! Everything tunable-but-fixed lives here so the rest of the crate never
//! embeds magic numbers. Values that are runtime-configurable instead live
//! in [`crate::config::NodeConfig`].

pub mod net;
pub mod power;
pub mod timing;

pub use net::*;
pub use power::*;
pub use timing::*;
