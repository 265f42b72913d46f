//! Sensor frame and reading types
//!
//! One acquisition yields a 5-byte frame: humidity integer and decimal
//! bytes, temperature integer and decimal bytes, checksum. The
//! temperature integer byte is sign-magnitude, with the sign in the top
//! bit. The checksum is the sum of the four data bytes mod 256.

/// Bytes in one sensor frame.
pub const FRAME_BYTES: usize = 5;

/// Raw 5-byte frame as decoded from the pulse widths, before checksum
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame([u8; FRAME_BYTES]);

impl SensorFrame {
    /// Wrap raw frame bytes.
    pub const fn new(bytes: [u8; FRAME_BYTES]) -> Self {
        Self(bytes)
    }

    /// The raw frame bytes.
    pub const fn bytes(&self) -> &[u8; FRAME_BYTES] {
        &self.0
    }

    /// Sum of the four data bytes mod 256.
    pub fn expected_checksum(&self) -> u8 {
        self.0[0]
            .wrapping_add(self.0[1])
            .wrapping_add(self.0[2])
            .wrapping_add(self.0[3])
    }

    /// True iff the checksum byte matches the data byte sum.
    pub fn checksum_ok(&self) -> bool {
        self.0[4] == self.expected_checksum()
    }

    /// True if no bit in the frame is set.
    ///
    /// A silent sensor leaves the capture empty and every bit decodes to
    /// zero; such a frame trivially satisfies the checksum and must not be
    /// mistaken for a 0.0 degree reading.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Convert to engineering units.
    ///
    /// `valid` carries the checksum verdict; callers decide what to do
    /// with an invalid reading.
    pub fn reading(&self) -> SensorReading {
        let rh = self.0[0] as u16 * 10 + self.0[1] as u16;

        let magnitude = (self.0[2] & 0x7f) as i16 * 10 + self.0[3] as i16;
        let temp = if self.0[2] & 0x80 != 0 { -magnitude } else { magnitude };

        SensorReading {
            temperature_tenths_c: temp,
            relative_humidity_tenths_pct: rh,
            valid: self.checksum_ok(),
        }
    }
}

/// One validated (or not) sensor measurement in tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorReading {
    /// Temperature in tenths of a degree Celsius, signed.
    pub temperature_tenths_c: i16,
    /// Relative humidity in tenths of a percent.
    pub relative_humidity_tenths_pct: u16,
    /// Whether the frame checksum held.
    pub valid: bool,
}
