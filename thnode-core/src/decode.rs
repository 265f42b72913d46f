//! Pulse-Width Signal Decoder
//!
//! ## Overview
//!
//! Turns one captured window of pulse widths into a [`SensorFrame`]. The
//! sensor encodes each of its 40 bits in the width of a high pulse: short
//! means 0, long means 1. Bits arrive most-significant first and pack
//! into five bytes.
//!
//! ```text
//! widths:  [ marker | w1 w2 w3 ... w40 ]
//!                      │  │  │       │
//!                      ▼  ▼  ▼       ▼
//! bits:                1  0  0  ...  1     (w >= 83 ticks  =>  1)
//!                      └──────┬──────┘
//!                        MSB-first into
//!                   [rh_i, rh_d, t_i, t_d, ck]
//! ```
//!
//! ## Leading offset
//!
//! The first captured width differs between a cold boot and a steady-state
//! re-arm. After a re-arm the first sample is the huge idle gap since the
//! previous window (tens of thousands of ticks), followed by the response
//! preamble; on a fresh power-up only the preamble is seen. The decoder
//! inspects the first sample and skips two samples in the former case, one
//! in the latter.
//!
//! ## Failure behavior
//!
//! Decoding never fails structurally. A truncated capture simply runs out
//! of samples and the remaining bits decode to zero; the resulting frame
//! is rejected by checksum (or by the blank-frame check) in the caller.

use crate::constants::{BIT_THRESHOLD_TICKS, FRAME_BITS, LEADER_THRESHOLD_TICKS};
use crate::frame::SensorFrame;

/// Decode one capture window into a frame.
///
/// Pure and idempotent: the same samples always produce the same frame.
/// Checksum validation is the caller's job.
pub fn decode(samples: &[u16]) -> SensorFrame {
    let offset = leading_offset(samples);

    let mut bytes = [0u8; 5];
    for bit in 0..FRAME_BITS {
        let one = samples
            .get(offset + bit)
            .is_some_and(|&w| w >= BIT_THRESHOLD_TICKS);

        bytes[bit / 8] <<= 1;
        bytes[bit / 8] |= one as u8;
    }

    SensorFrame::new(bytes)
}

/// Number of leading samples to skip before the first data bit.
fn leading_offset(samples: &[u16]) -> usize {
    match samples.first() {
        Some(&w) if w > LEADER_THRESHOLD_TICKS => 2,
        _ => 1,
    }
}
