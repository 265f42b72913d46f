//! Sensor protocol and scheduler timing constants
//!
//! The single-wire sensor protocol is pulse-width encoded: the node holds
//! the data line low to request a reading, releases it, and the sensor
//! answers with 40 pulses whose widths encode the frame bits. Widths are
//! measured in capture-timer ticks (24 MHz prescaled by 16, so one tick is
//! 2/3 us).

/// Capacity of the pulse capture buffer in samples.
///
/// The sensor sends 40 data bits plus a preamble; 64 leaves headroom for
/// spurious edges without letting the window wrap.
pub const MAX_PULSE_SAMPLES: usize = 64;

/// Number of data bits in one sensor frame.
pub const FRAME_BITS: usize = 40;

/// Pulse widths at or above this many ticks decode to bit 1, below to bit 0.
///
/// The sensor signals a 0 with a ~26 us high pulse and a 1 with ~70 us;
/// 83 ticks (~55 us) sits between the two clusters.
pub const BIT_THRESHOLD_TICKS: u16 = 83;

/// First-sample magnitude above which the capture starts with an extra
/// leading pulse.
///
/// A steady-state re-arm leaves a very long first width (the idle time
/// since the previous window), so the decoder skips two samples; a fresh
/// power-up produces a short preamble and only one sample is skipped.
pub const LEADER_THRESHOLD_TICKS: u16 = 5000;

/// How long the data line is held low to request a reading.
pub const START_PULSE_MS: u32 = 18;

/// How long the line is left in high-impedance while the sensor answers.
pub const LISTEN_WINDOW_MS: u32 = 50;

/// Delay between acquisition retries after a checksum failure.
///
/// The sensor needs about two seconds between conversions.
pub const SENSOR_RETRY_DELAY_MS: u32 = 2000;

/// Total acquisition attempts per wake cycle before the cycle reports a
/// sensor failure instead of a reading.
pub const SENSOR_RETRY_BUDGET: u8 = 3;

/// How long to stay awake after an unconfirmed report before sleeping.
///
/// An unconfirmed post either gets a response well inside this window or
/// not at all; waiting longer only burns battery.
pub const SLEEP_AFTER_POST_MS: u32 = 50;

/// Margin subtracted from the computed sleep duration so the node is awake
/// again slightly before the next post is due.
pub const SLEEP_GUARD_MS: u64 = 100;

/// Delay from boot to the forced first acquisition cycle.
pub const FIRST_POST_DELAY_MS: u64 = 1000;

/// Time since boot after which reports start carrying the battery voltage.
pub const VBATT_WARMUP_MS: u64 = 30_000;
