//! Persisted node configuration
//!
//! ## Record format
//!
//! The config lives in one fixed flash region as a 96-byte record:
//!
//! ```text
//! offset  size  field
//!      0     4  magic (LE)
//!      4     2  layout version (LE)
//!      6     1  sink host length
//!      7    31  sink host bytes, zero padded
//!     38     1  sink path length
//!     39    31  sink path bytes, zero padded
//!     70    16  static sink address
//!     86     2  post interval, seconds (LE)
//!     88     2  power-on wake time, seconds (LE)
//!     90     2  posts per reachability check (LE)
//!     92     1  sleep allowed flag
//!     93     1  max consecutive post failures
//!     94     1  radio channel
//!     95     1  reserved
//! ```
//!
//! Magic and version are the whole integrity story. A record that fails
//! either check (including the half-written result of losing power inside
//! `save`) is replaced by compiled-in defaults which are immediately
//! persisted, so a corrupted node converges back to a known state after
//! one boot.

use heapless::String;

use crate::constants::{
    DEFAULT_MAX_POST_FAILS, DEFAULT_POSTS_PER_CHECK, DEFAULT_POST_INTERVAL_S,
    DEFAULT_RADIO_CHANNEL, DEFAULT_SINK_PATH, DEFAULT_WAKE_TIME_S, MAX_HOST_LEN, MAX_PATH_LEN,
};
use crate::errors::ConfigError;
use crate::hal::{NodeAddr, NvStorage};
use crate::logging::{log_info, log_warn};

/// Expected record magic, "THND".
pub const CONFIG_MAGIC: u32 = 0x5448_4e44;

/// Expected record layout version.
pub const CONFIG_VERSION: u16 = 1;

/// Size of the stored record in bytes.
pub const RECORD_LEN: usize = 96;

/// The node's runtime-configurable operational parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeConfig {
    /// Sink hostname; empty when the sink is addressed directly.
    pub sink_host: String<MAX_HOST_LEN>,
    /// Resource path on the sink.
    pub sink_path: String<MAX_PATH_LEN>,
    /// Static sink address; all-zero when unset.
    pub sink_address: NodeAddr,
    /// Seconds between wake cycles.
    pub post_interval_s: u16,
    /// Seconds after power-on before sleeping is permitted.
    pub wake_time_s: u16,
    /// Wake cycles between reachability checks.
    pub posts_per_check: u16,
    /// Whether the node may sleep at all.
    pub sleep_allowed: bool,
    /// Consecutive confirmed-delivery failures before recovery.
    pub max_post_fails: u8,
    /// Radio channel. Changing it requires a reboot to take effect.
    pub radio_channel: u8,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sink_host: String::new(),
            sink_path: bounded(DEFAULT_SINK_PATH),
            sink_address: NodeAddr::UNSPECIFIED,
            post_interval_s: DEFAULT_POST_INTERVAL_S,
            wake_time_s: DEFAULT_WAKE_TIME_S,
            posts_per_check: DEFAULT_POSTS_PER_CHECK,
            sleep_allowed: true,
            max_post_fails: DEFAULT_MAX_POST_FAILS,
            radio_channel: DEFAULT_RADIO_CHANNEL,
        }
    }
}

/// Build a bounded string from a literal known to fit.
fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

impl NodeConfig {
    /// Check the invariants the scheduler relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_interval_s == 0 {
            return Err(ConfigError::FieldOutOfRange { field: "post_interval_s" });
        }
        if self.posts_per_check == 0 {
            return Err(ConfigError::FieldOutOfRange { field: "posts_per_check" });
        }
        if self.max_post_fails == 0 {
            return Err(ConfigError::FieldOutOfRange { field: "max_post_fails" });
        }
        Ok(())
    }

    /// Serialize to the stored record format.
    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let mut rec = [0u8; RECORD_LEN];
        rec[0..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
        rec[4..6].copy_from_slice(&CONFIG_VERSION.to_le_bytes());

        let host = self.sink_host.as_bytes();
        rec[6] = host.len() as u8;
        rec[7..7 + host.len()].copy_from_slice(host);

        let path = self.sink_path.as_bytes();
        rec[38] = path.len() as u8;
        rec[39..39 + path.len()].copy_from_slice(path);

        rec[70..86].copy_from_slice(&self.sink_address.0);
        rec[86..88].copy_from_slice(&self.post_interval_s.to_le_bytes());
        rec[88..90].copy_from_slice(&self.wake_time_s.to_le_bytes());
        rec[90..92].copy_from_slice(&self.posts_per_check.to_le_bytes());
        rec[92] = self.sleep_allowed as u8;
        rec[93] = self.max_post_fails;
        rec[94] = self.radio_channel;
        rec
    }

    /// Deserialize from a stored record, checking magic and version.
    pub fn from_record(rec: &[u8]) -> Result<Self, ConfigError> {
        if rec.len() < RECORD_LEN {
            return Err(ConfigError::Malformed);
        }

        let magic = u32::from_le_bytes([rec[0], rec[1], rec[2], rec[3]]);
        if magic != CONFIG_MAGIC {
            return Err(ConfigError::BadMagic { found: magic });
        }
        let version = u16::from_le_bytes([rec[4], rec[5]]);
        if version != CONFIG_VERSION {
            return Err(ConfigError::BadVersion { found: version });
        }

        let sink_host = read_string::<MAX_HOST_LEN>(rec[6], &rec[7..38], "sink_host")?;
        let sink_path = read_string::<MAX_PATH_LEN>(rec[38], &rec[39..70], "sink_path")?;

        let mut addr = [0u8; 16];
        addr.copy_from_slice(&rec[70..86]);

        let cfg = Self {
            sink_host,
            sink_path,
            sink_address: NodeAddr(addr),
            post_interval_s: u16::from_le_bytes([rec[86], rec[87]]),
            wake_time_s: u16::from_le_bytes([rec[88], rec[89]]),
            posts_per_check: u16::from_le_bytes([rec[90], rec[91]]),
            sleep_allowed: rec[92] != 0,
            max_post_fails: rec[93],
            radio_channel: rec[94],
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Post interval in milliseconds.
    pub fn post_interval_ms(&self) -> u64 {
        self.post_interval_s as u64 * 1000
    }

    /// Power-on wake window in milliseconds.
    pub fn wake_time_ms(&self) -> u64 {
        self.wake_time_s as u64 * 1000
    }
}

fn read_string<const N: usize>(
    len: u8,
    field: &[u8],
    name: &'static str,
) -> Result<String<N>, ConfigError> {
    let len = len as usize;
    if len > N {
        return Err(ConfigError::FieldTooLong { field: name });
    }
    let s = core::str::from_utf8(&field[..len]).map_err(|_| ConfigError::Malformed)?;
    Ok(bounded(s))
}

/// Loads, validates and saves the config record over an [`NvStorage`]
/// region.
pub struct ConfigStore<S: NvStorage> {
    storage: S,
}

impl<S: NvStorage> ConfigStore<S> {
    /// Wrap a storage region.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the persisted config.
    ///
    /// Any failure to produce a valid record (absent, short, corrupted,
    /// wrong version, storage error) resolves to the compiled-in defaults,
    /// which are persisted back immediately so the next load succeeds.
    pub fn load(&mut self) -> NodeConfig {
        let mut rec = [0u8; RECORD_LEN];
        let outcome = match self.storage.read(&mut rec) {
            Ok(n) => NodeConfig::from_record(&rec[..n]),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(cfg) => cfg,
            Err(e) => {
                log_warn!("config record invalid ({}), using defaults", e);
                let cfg = NodeConfig::default();
                if let Err(e) = self.save(&cfg) {
                    log_warn!("persisting default config failed: {}", e);
                }
                cfg
            }
        }
    }

    /// Persist `cfg`: erase, then write.
    ///
    /// Not atomic across power loss. A tear leaves a record that fails the
    /// magic/version check and is repaired on the next load.
    pub fn save(&mut self, cfg: &NodeConfig) -> Result<(), ConfigError> {
        self.storage.erase()?;
        self.storage.write(&cfg.to_record())?;
        Ok(())
    }

    /// Apply a mutation, re-validate, and persist the result.
    ///
    /// On validation failure the previous value is restored and nothing is
    /// written.
    pub fn update<F>(&mut self, cfg: &mut NodeConfig, mutate: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut NodeConfig),
    {
        let previous = cfg.clone();
        mutate(cfg);
        if let Err(e) = cfg.validate() {
            *cfg = previous;
            return Err(e);
        }
        self.save(cfg)?;
        log_info!("config updated and persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;

    /// In-memory flash region.
    #[derive(Default)]
    struct StubFlash {
        data: Vec<u8>,
        erases: usize,
    }

    impl NvStorage for StubFlash {
        fn erase(&mut self) -> Result<(), StorageError> {
            self.data.clear();
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
            self.data.extend_from_slice(bytes);
            Ok(())
        }

        fn read(&mut self, out: &mut [u8]) -> Result<usize, StorageError> {
            let n = self.data.len().min(out.len());
            out[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }

    fn custom_config() -> NodeConfig {
        let mut cfg = NodeConfig::default();
        cfg.sink_host = bounded("collector.example");
        cfg.post_interval_s = 60;
        cfg.posts_per_check = 3;
        cfg.sleep_allowed = false;
        cfg
    }

    #[test]
    fn record_roundtrip() {
        let cfg = custom_config();
        let rec = cfg.to_record();
        assert_eq!(NodeConfig::from_record(&rec).unwrap(), cfg);
    }

    #[test]
    fn empty_storage_yields_persisted_defaults() {
        let mut store = ConfigStore::new(StubFlash::default());
        let cfg = store.load();
        assert_eq!(cfg, NodeConfig::default());

        // Defaults were written back: a second load parses the record.
        assert_eq!(store.storage.data.len(), RECORD_LEN);
        assert_eq!(store.load(), NodeConfig::default());
    }

    #[test]
    fn corrupted_magic_repairs_to_defaults() {
        let mut store = ConfigStore::new(StubFlash::default());
        store.save(&custom_config()).unwrap();

        store.storage.data[0] ^= 0xff;
        let cfg = store.load();
        assert_eq!(cfg, NodeConfig::default());

        // And the repair was persisted.
        assert_eq!(store.load(), NodeConfig::default());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut rec = NodeConfig::default().to_record();
        rec[4] = 0xfe;
        assert!(matches!(
            NodeConfig::from_record(&rec),
            Err(ConfigError::BadVersion { found: 0xfe })
        ));
    }

    #[test]
    fn short_record_rejected() {
        let rec = NodeConfig::default().to_record();
        assert!(matches!(
            NodeConfig::from_record(&rec[..40]),
            Err(ConfigError::Malformed)
        ));
    }

    #[test]
    fn update_persists_via_erase_then_write() {
        let mut store = ConfigStore::new(StubFlash::default());
        let mut cfg = store.load();
        let erases_before = store.storage.erases;

        store.update(&mut cfg, |c| c.post_interval_s = 120).unwrap();
        assert_eq!(store.storage.erases, erases_before + 1);
        assert_eq!(store.load().post_interval_s, 120);
    }

    #[test]
    fn invalid_update_rolls_back_and_does_not_write() {
        let mut store = ConfigStore::new(StubFlash::default());
        let mut cfg = store.load();
        let data_before = store.storage.data.clone();

        let err = store.update(&mut cfg, |c| c.post_interval_s = 0);
        assert!(matches!(err, Err(ConfigError::FieldOutOfRange { .. })));
        assert_eq!(cfg.post_interval_s, NodeConfig::default().post_interval_s);
        assert_eq!(store.storage.data, data_before);
    }

    #[test]
    fn validate_rejects_zero_posts_per_check() {
        let mut cfg = NodeConfig::default();
        cfg.posts_per_check = 0;
        assert!(cfg.validate().is_err());
    }
}
