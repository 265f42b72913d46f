//! Report payload composition
//!
//! The sink speaks a fixed single-line JSON dialect; the exact byte layout
//! is load-bearing for interoperability and must not drift:
//!
//! ```text
//! {"eui":"0011223344556677","t":" 18.0C","h":"53.0%","vb":"2987mV"}
//! {"eui":"0011223344556677","t":"-4.2C","h":"61.3%"}
//! {"eui":"0011223344556677","err":"sensor read failed"}
//! ```
//!
//! Non-negative temperatures carry a space where the minus sign would be.
//! The `vb` field appears only once the battery warm-up delay has passed,
//! signalled here by the caller passing `Some` millivolts.

use core::fmt::Write;

use heapless::String;

use crate::frame::SensorReading;

/// Maximum payload length in bytes.
///
/// Worst case is the telemetry form with extreme values, around 70 bytes;
/// 96 leaves margin.
pub const MAX_PAYLOAD: usize = 96;

/// One composed report body.
pub type ReportBody = String<MAX_PAYLOAD>;

/// Error tag sent when the sensor gave no usable reading.
pub const SENSOR_ERROR_TAG: &str = "sensor read failed";

/// Compose the telemetry body for a valid reading.
pub fn telemetry_body(eui: &[u8; 8], reading: &SensorReading, battery_mv: Option<u16>) -> ReportBody {
    let mut body = ReportBody::new();

    let t = reading.temperature_tenths_c as i32;
    let sign = if t < 0 { '-' } else { ' ' };
    let t_mag = t.unsigned_abs();

    let rh = reading.relative_humidity_tenths_pct;

    // Capacity is sized for the worst case; see MAX_PAYLOAD.
    let _ = write!(
        body,
        "{{\"eui\":\"{}\",\"t\":\"{}{}.{}C\",\"h\":\"{}.{}%\"",
        EuiHex(eui),
        sign,
        t_mag / 10,
        t_mag % 10,
        rh / 10,
        rh % 10,
    );
    if let Some(mv) = battery_mv {
        let _ = write!(body, ",\"vb\":\"{}mV\"", mv);
    }
    let _ = body.push('}');

    body
}

/// Compose the body sent in place of a reading when acquisition failed.
pub fn error_body(eui: &[u8; 8], message: &str) -> ReportBody {
    let mut body = ReportBody::new();
    let _ = write!(body, "{{\"eui\":\"{}\",\"err\":\"{}\"}}", EuiHex(eui), message);
    body
}

/// Formats the hardware identifier as sixteen lowercase hex characters.
struct EuiHex<'a>(&'a [u8; 8]);

impl core::fmt::Display for EuiHex<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
