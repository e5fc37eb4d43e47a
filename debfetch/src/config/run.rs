//! Run context threaded through the method registry.
//!
//! Everything the coordinator would otherwise read from process-wide state
//! (where method programs live, how chatty to be, whether the user asked to
//! stop) is carried in a [`RunConfig`] handed to the registry at creation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::defaults::{
    DEFAULT_CONFIG_ITEM, DEFAULT_EXIT_GRACE_MS, DEFAULT_MAX_BLOCK_LEN, DEFAULT_METHOD_DIR,
    DEFAULT_REAP_INTERVAL_MS,
};

/// Verbosity above which advisory method messages are logged at info level.
pub const PROTOCOL_CHATTER_VERBOSITY: u8 = 1;

/// Settings for one coordinator lifetime.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Directory holding one executable per method name.
    pub method_dir: PathBuf,

    /// User-selected verbosity (0 = quiet).
    pub verbosity: u8,

    /// Extra environment variables set for every method process.
    pub environment: BTreeMap<String, String>,

    /// Longest status block accepted from a method, in bytes.
    pub max_block_len: usize,

    /// Readiness wait timeout while the decompression helper is busy.
    ///
    /// Without it, exits of helper children would only be noticed when a
    /// method channel becomes ready.
    pub reap_interval: Duration,

    /// How long a run keeps polling for a closed method's exit before it
    /// leaves the child to [`shutdown`](crate::acquire::MethodRegistry::shutdown).
    pub exit_grace: Duration,

    /// Item sent in a configuration block when a method was created without any.
    pub default_config_item: String,

    /// Cooperative cancellation flag.
    pub interrupt: CancellationToken,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method_dir: PathBuf::from(DEFAULT_METHOD_DIR),
            verbosity: 0,
            environment: BTreeMap::new(),
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            reap_interval: Duration::from_millis(DEFAULT_REAP_INTERVAL_MS),
            exit_grace: Duration::from_millis(DEFAULT_EXIT_GRACE_MS),
            default_config_item: DEFAULT_CONFIG_ITEM.to_string(),
            interrupt: CancellationToken::new(),
        }
    }
}

impl RunConfig {
    /// Create a config using the given method directory.
    pub fn new(method_dir: impl Into<PathBuf>) -> Self {
        Self {
            method_dir: method_dir.into(),
            ..Self::default()
        }
    }

    /// Set the verbosity.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Add an environment variable for method processes.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Set the longest accepted status block.
    pub fn with_max_block_len(mut self, max_block_len: usize) -> Self {
        self.max_block_len = max_block_len;
        self
    }

    /// Set the readiness wait timeout used while decompression is pending.
    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Set how long a run waits for closed methods to exit.
    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Whether advisory method messages should be surfaced.
    pub fn shows_protocol_chatter(&self) -> bool {
        self.verbosity > PROTOCOL_CHATTER_VERBOSITY
    }

    /// Whether cancellation was requested.
    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.method_dir, PathBuf::from("/usr/lib/apt/methods"));
        assert_eq!(config.max_block_len, 128_000);
        assert_eq!(config.default_config_item, "Dir=/");
        assert_eq!(config.exit_grace, Duration::from_secs(2));
        assert!(!config.is_interrupted());
        assert!(!config.shows_protocol_chatter());
    }

    #[test]
    fn test_builder() {
        let token = CancellationToken::new();
        let config = RunConfig::new("/opt/methods")
            .with_verbosity(2)
            .with_env("DEBFETCH_ACTION", "update")
            .with_max_block_len(64)
            .with_interrupt(token.clone());

        assert_eq!(config.method_dir, PathBuf::from("/opt/methods"));
        assert!(config.shows_protocol_chatter());
        assert_eq!(
            config.environment.get("DEBFETCH_ACTION").map(String::as_str),
            Some("update")
        );
        assert_eq!(config.max_block_len, 64);

        token.cancel();
        assert!(config.is_interrupted());
    }
}
