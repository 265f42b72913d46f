//! Pulse-Width Capture Buffer Shared With the Edge-Capture Interrupt
#![allow(unsafe_code)] // Required for the lock-free producer/consumer handoff
//!
//! ## Overview
//!
//! During one acquisition window the capture timer fires an interrupt on
//! every signal edge and the handler records the width of the pulse that
//! just ended. The cooperative loop reads the accumulated widths only
//! after the capture peripheral is disarmed, so the producer and the
//! consumer never touch the buffer at the same instant.
//!
//! ```text
//! ISR (producer)                      Cooperative loop (consumer)
//!      │ record()                            │
//!      ▼                                     │  capture disarmed
//! ┌────┬────┬────┬────┬─ ─ ─┬────┐           ▼
//! │ w0 │ w1 │ w2 │ w3 │     │    │ ───▶ snapshot()
//! └────┴────┴────┴────┴─ ─ ─┴────┘
//!                  ▲
//!                write index (atomic)
//! ```
//!
//! ## Why not a mutex?
//!
//! The producer runs in interrupt context and can never block. A single
//! atomic write index with release/acquire ordering is enough: the ISR
//! publishes each sample before bumping the index, and the consumer's
//! acquire load observes every published sample. No compare-and-swap, no
//! critical section.
//!
//! ## Wrap-around
//!
//! The index silently wraps at capacity, matching the hardware handler's
//! behavior. A full frame is 40 bits plus a short preamble, well inside
//! the 64-sample capacity, so a wrap during one window only happens when
//! the line is glitching badly; the resulting frame fails its checksum
//! and the cycle retries.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity pulse-width buffer with a single interrupt producer and
/// a single cooperative consumer.
///
/// `N` is the capture window capacity in samples. The type is `Sync` so it
/// can live in a `static` reachable from the interrupt handler.
pub struct PulseBuffer<const N: usize> {
    /// Sample storage, written only by the producer.
    samples: UnsafeCell<[u16; N]>,

    /// Next write position; wraps at `N`.
    widx: AtomicUsize,
}

// The producer/consumer protocol above is the synchronization: samples are
// published before the index, and the consumer reads only while the
// producer is disarmed.
unsafe impl<const N: usize> Sync for PulseBuffer<N> {}

impl<const N: usize> PulseBuffer<N> {
    /// Create an empty buffer. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            samples: UnsafeCell::new([0; N]),
            widx: AtomicUsize::new(0),
        }
    }

    /// Record one pulse width.
    ///
    /// ## Safety contract
    ///
    /// Producer side only: must be called from a single interrupt handler,
    /// never concurrently with itself.
    pub fn record(&self, width: u16) {
        let idx = self.widx.load(Ordering::Relaxed);

        // Sole producer, and the consumer does not read past widx.
        unsafe {
            (*self.samples.get())[idx] = width;
        }

        // Publish the sample before exposing the new index.
        let next = if idx + 1 >= N { 0 } else { idx + 1 };
        self.widx.store(next, Ordering::Release);
    }

    /// Number of samples recorded since the last [`reset`](Self::reset),
    /// modulo capacity.
    pub fn len(&self) -> usize {
        self.widx.load(Ordering::Acquire)
    }

    /// True if nothing has been recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the captured window into `out`, returning the sample count.
    ///
    /// Consumer side only, and only after the capture source is disarmed;
    /// that ordering is what makes the read race-free.
    pub fn snapshot(&self, out: &mut [u16; N]) -> usize {
        let len = self.widx.load(Ordering::Acquire);

        // Producer is quiescent by contract.
        let samples = unsafe { &*self.samples.get() };
        out[..len].copy_from_slice(&samples[..len]);
        len
    }

    /// Discard all samples and start a new window.
    ///
    /// Must only be called while the capture source is disarmed.
    pub fn reset(&self) {
        self.widx.store(0, Ordering::Release);
    }
}

impl<const N: usize> Default for PulseBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let buf: PulseBuffer<8> = PulseBuffer::new();
        assert!(buf.is_empty());

        let mut out = [0u16; 8];
        assert_eq!(buf.snapshot(&mut out), 0);
    }

    #[test]
    fn record_and_snapshot() {
        let buf: PulseBuffer<8> = PulseBuffer::new();
        for w in [120u16, 40, 40, 120] {
            buf.record(w);
        }

        let mut out = [0u16; 8];
        let n = buf.snapshot(&mut out);
        assert_eq!(n, 4);
        assert_eq!(&out[..n], &[120, 40, 40, 120]);
    }

    #[test]
    fn reset_discards_window() {
        let buf: PulseBuffer<4> = PulseBuffer::new();
        buf.record(55);
        buf.record(66);
        buf.reset();

        assert!(buf.is_empty());
        buf.record(77);

        let mut out = [0u16; 4];
        let n = buf.snapshot(&mut out);
        assert_eq!(&out[..n], &[77]);
    }

    #[test]
    fn index_wraps_at_capacity() {
        let buf: PulseBuffer<4> = PulseBuffer::new();
        for w in 0..5u16 {
            buf.record(w);
        }

        // Five records into four slots: the index wrapped past zero.
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn static_usable() {
        static BUF: PulseBuffer<4> = PulseBuffer::new();
        BUF.reset();
        BUF.record(42);
        assert_eq!(BUF.len(), 1);
    }
}
