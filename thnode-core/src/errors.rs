//! Error types
//!
//! Errors here follow the same rules as the rest of the core: small,
//! `Copy`, no heap, only `&'static str` payloads. Most failures are
//! absorbed into scheduler state counters rather than propagated; the
//! types below exist for the few seams where a caller genuinely branches
//! on the cause.

use thiserror_no_std::Error;

/// Why a sensor acquisition produced no reading.
///
/// Both variants mean the same thing to the retry policy; the split only
/// makes the logs tell silence apart from corruption.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// Frame checksum did not match the byte sum.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch {
        /// Sum of the four data bytes, mod 256.
        expected: u8,
        /// Checksum byte actually received.
        actual: u8,
    },

    /// No edges were captured at all; the sensor never answered.
    #[error("sensor silent: no pulses captured")]
    NoResponse,
}

/// Persistent storage primitive failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Erase of the config region failed.
    #[error("flash erase failed")]
    EraseFailed,
    /// Write to the config region failed.
    #[error("flash write failed")]
    WriteFailed,
    /// Read from the config region failed.
    #[error("flash read failed")]
    ReadFailed,
}

/// Config record problems.
///
/// `BadMagic`/`BadVersion`/`Malformed` are recovered internally by
/// substituting defaults; they only reach callers through logs. The
/// validation variants are returned from explicit update operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored record does not start with the expected magic.
    #[error("bad config magic: {found:#010x}")]
    BadMagic {
        /// Magic value actually read.
        found: u32,
    },

    /// Stored record has an unknown layout version.
    #[error("bad config version: {found}")]
    BadVersion {
        /// Version value actually read.
        found: u16,
    },

    /// Record too short or a string field is not valid UTF-8.
    #[error("malformed config record")]
    Malformed,

    /// A string field exceeds its stored capacity.
    #[error("config field too long: {field}")]
    FieldTooLong {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric field has a value the scheduler cannot run with.
    #[error("config field out of range: {field}")]
    FieldOutOfRange {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Underlying storage failed.
    #[error("config storage: {0}")]
    Storage(#[from] StorageError),
}

/// Report transport send failure.
///
/// Only the submission can fail; delivery outcomes arrive later as
/// scheduler events.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// A previous exchange is still in flight.
    #[error("transport busy")]
    Busy,
    /// No route towards the sink.
    #[error("no route to sink")]
    NoRoute,
}

#[cfg(feature = "defmt")]
impl defmt::Format for AcquireError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::ChecksumMismatch { expected, actual } => {
                defmt::write!(fmt, "checksum mismatch: expected {:#04x}, got {:#04x}", expected, actual)
            }
            Self::NoResponse => defmt::write!(fmt, "sensor silent"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::BadMagic { found } => defmt::write!(fmt, "bad config magic: {:#010x}", found),
            Self::BadVersion { found } => defmt::write!(fmt, "bad config version: {}", found),
            Self::Malformed => defmt::write!(fmt, "malformed config record"),
            Self::FieldTooLong { field } => defmt::write!(fmt, "config field too long: {}", field),
            Self::FieldOutOfRange { field } => defmt::write!(fmt, "config field out of range: {}", field),
            Self::Storage(_) => defmt::write!(fmt, "config storage failure"),
        }
    }
}
