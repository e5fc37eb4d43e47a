//! Default values for all configuration settings.

use std::path::PathBuf;

use super::settings::{ConfigFile, LoggingSettings, MethodSettings};

/// Where apt installs its acquisition methods.
pub const DEFAULT_METHOD_DIR: &str = "/usr/lib/apt/methods";

/// Longest status block accepted from a method (bytes).
pub const DEFAULT_MAX_BLOCK_LEN: usize = 128_000;

/// Poll timeout while the decompression helper still has children (ms).
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 100;

/// How long a run waits for a method whose channels are closed to exit (ms).
pub const DEFAULT_EXIT_GRACE_MS: u64 = 2_000;

/// Configuration item sent when a method was created without any.
pub const DEFAULT_CONFIG_ITEM: &str = "Dir=/";

/// Default verbosity.
pub const DEFAULT_VERBOSITY: u8 = 0;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "debfetch.log";

/// Get the path to the config directory (~/.debfetch).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".debfetch")
}

/// Get the path to the config file (~/.debfetch/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Default directory for log files (~/.debfetch/logs).
pub fn default_log_directory() -> PathBuf {
    config_directory().join("logs")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            methods: MethodSettings {
                directory: PathBuf::from(DEFAULT_METHOD_DIR),
                config_items: Vec::new(),
                max_block_len: DEFAULT_MAX_BLOCK_LEN,
            },
            logging: LoggingSettings {
                verbosity: DEFAULT_VERBOSITY,
                directory: default_log_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
