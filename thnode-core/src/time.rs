//! Time handling
//!
//! The node only ever needs a monotonic millisecond counter: sleep
//! durations and post deadlines are all computed as differences. Wall
//! clock time never enters the picture; the platform clock starts at
//! boot and the simulator's virtual clock starts at zero.

/// Milliseconds since device boot.
pub type Timestamp = u64;
