//! Sleep policy
//!
//! Between cycles the node suspends the processor so that it wakes just
//! ahead of the next scheduled post. Sleeping is gated three ways: the
//! operator can forbid it outright (`sleep_allowed`), the power-on wake
//! window must have elapsed (`sleep_permitted`), and a confirmed exchange
//! must not be mid-flight, since its completion event would be lost.

use crate::constants::{BOOST_THRESHOLD_MV, SLEEP_GUARD_MS};
use crate::hal::Platform;
use crate::logging::{log_debug, log_info};
use crate::time::Timestamp;

/// Everything the sleep decision reads, snapshotted by the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SleepInputs {
    /// Operator switch from the persisted config.
    pub sleep_allowed: bool,
    /// Power-on wake window has elapsed.
    pub sleep_permitted: bool,
    /// A confirmed exchange is awaiting completion.
    pub confirm_pending: bool,
    /// When the next wake cycle is due.
    pub next_post_due: Timestamp,
    /// Last sampled battery voltage.
    pub battery_mv: u16,
}

/// What the sleep attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// Operator forbids sleeping.
    Disabled,
    /// Still inside the power-on wake window.
    NotPermitted,
    /// A confirmed exchange is outstanding.
    ConfirmPending,
    /// The next cycle is already (nearly) due; sleeping skipped.
    CycleDue,
    /// Slept for this many milliseconds.
    Slept(u64),
}

/// Sleep if all preconditions hold, for exactly the time left until the
/// next post minus a guard margin.
pub fn maybe_sleep<P: Platform>(platform: &mut P, inputs: SleepInputs) -> SleepOutcome {
    if !inputs.sleep_allowed {
        return SleepOutcome::Disabled;
    }
    if !inputs.sleep_permitted {
        return SleepOutcome::NotPermitted;
    }
    if inputs.confirm_pending {
        return SleepOutcome::ConfirmPending;
    }

    // Sensor hardware is powered down across the suspension. A sagging
    // battery keeps the boost converter alive through sleep so the radio
    // rail is stable at wake.
    platform.sensor_power(false);
    platform.hold_boost_in_sleep(inputs.battery_mv < BOOST_THRESHOLD_MV);

    let now = platform.now_ms();
    let remaining = inputs.next_post_due.saturating_sub(now);
    if remaining <= SLEEP_GUARD_MS {
        log_debug!("sleep skipped, next post due in {}ms", remaining);
        platform.sensor_power(true);
        return SleepOutcome::CycleDue;
    }

    let duration = remaining - SLEEP_GUARD_MS;
    log_info!("sleeping for {}ms", duration);
    platform.sleep_for_ms(duration);
    platform.sensor_power(true);

    SleepOutcome::Slept(duration)
}
