//! Battery thresholds for the power policy

/// Minimum battery voltage for a self-reboot, in millivolts.
///
/// Rebooting on a sagging battery risks a brown-out loop that never
/// completes boot; below this floor the node falls back to a mesh re-join
/// instead.
pub const REBOOT_FLOOR_MV: u16 = 2500;

/// Below this battery voltage the boost converter is kept enabled while
/// sleeping, in millivolts.
pub const BOOST_THRESHOLD_MV: u16 = 2800;
