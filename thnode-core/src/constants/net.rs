//! Network defaults and persisted-config bounds

/// Default UDP port reports are sent to.
pub const DEFAULT_SINK_PORT: u16 = 5683;

/// Default resource path on the sink.
pub const DEFAULT_SINK_PATH: &str = "/th12";

/// Default seconds between wake cycles.
pub const DEFAULT_POST_INTERVAL_S: u16 = 10;

/// Default seconds after power-on before sleeping is permitted.
///
/// Keeping the node awake for a while after plug-in gives the operator a
/// window to reach it over the mesh before it starts duty cycling.
pub const DEFAULT_WAKE_TIME_S: u16 = 30;

/// Default number of wake cycles between reachability checks.
pub const DEFAULT_POSTS_PER_CHECK: u16 = 6;

/// Default consecutive confirmed-delivery failures tolerated before the
/// recovery policy kicks in.
pub const DEFAULT_MAX_POST_FAILS: u8 = 5;

/// Default radio channel.
pub const DEFAULT_RADIO_CHANNEL: u8 = 16;

/// Maximum stored sink hostname length in bytes.
pub const MAX_HOST_LEN: usize = 31;

/// Maximum stored sink path length in bytes.
pub const MAX_PATH_LEN: usize = 31;
