//! Sensor acquisition sequence
//!
//! One acquisition is a strict hardware dance: hold the data line low to
//! wake the sensor, release it and capture the pulse-width response, then
//! park the line high again. The captured window is decoded and checksum
//! validated here; retry policy belongs to the scheduler.
//!
//! Timing matters. If the start pulse is too short or the listen window
//! closes early the sensor simply does not answer, which surfaces as an
//! empty or blank capture. A garbled answer surfaces as a checksum
//! failure. Both are worth a retry; the distinction only feeds the logs.

use crate::constants::{LISTEN_WINDOW_MS, MAX_PULSE_SAMPLES, START_PULSE_MS};
use crate::decode::decode;
use crate::errors::AcquireError;
use crate::frame::SensorReading;
use crate::hal::Platform;
use crate::logging::log_debug;

/// Run one full acquisition, returning a validated reading.
///
/// The capture peripheral is armed strictly before the line is released
/// and disarmed strictly before the buffer is read; that bracket is what
/// keeps the interrupt producer and this consumer off the buffer at the
/// same time.
pub fn acquire<P: Platform>(platform: &mut P) -> Result<SensorReading, AcquireError> {
    platform.capture_reset();

    // Request pulse: line low long enough for the sensor to notice.
    platform.line_low();
    platform.delay_ms(START_PULSE_MS);

    // Listen: sensor drives the line, edges stream into the buffer.
    platform.capture_arm();
    platform.line_release();
    platform.delay_ms(LISTEN_WINDOW_MS);
    platform.capture_disarm();

    // Park the line high until the next cycle.
    platform.line_high();

    let mut raw = [0u16; MAX_PULSE_SAMPLES];
    let n = platform.capture_snapshot(&mut raw);
    if n == 0 {
        return Err(AcquireError::NoResponse);
    }

    let frame = decode(&raw[..n]);
    log_debug!("acquired {} pulses, frame {:02x?}", n, frame.bytes());

    if frame.is_blank() {
        // A blank frame passes the checksum trivially; treat it as silence.
        return Err(AcquireError::NoResponse);
    }
    if !frame.checksum_ok() {
        return Err(AcquireError::ChecksumMismatch {
            expected: frame.expected_checksum(),
            actual: frame.bytes()[4],
        });
    }

    Ok(frame.reading())
}
