//! Configuration for debfetch.
//!
//! Two layers:
//!
//! - [`RunConfig`]: the explicit context handed to the method registry
//!   (method directory, verbosity, cancellation, limits).
//! - [`ConfigFile`]: the user's `~/.debfetch/config.ini`, from which a
//!   `RunConfig` is derived.
//!
//! # Example
//!
//! ```
//! use debfetch::config::{ConfigFile, RunConfig};
//!
//! let run = ConfigFile::default().to_run_config().with_verbosity(2);
//! assert_eq!(run.max_block_len, 128_000);
//!
//! let custom = RunConfig::new("/opt/methods");
//! assert!(!custom.is_interrupted());
//! ```

mod defaults;
mod file;
mod parser;
mod run;
mod settings;
mod writer;

pub use defaults::{
    config_directory, config_file_path, default_log_directory, DEFAULT_CONFIG_ITEM,
    DEFAULT_EXIT_GRACE_MS, DEFAULT_LOG_FILE, DEFAULT_MAX_BLOCK_LEN, DEFAULT_METHOD_DIR,
    DEFAULT_REAP_INTERVAL_MS, DEFAULT_VERBOSITY,
};
pub use file::ConfigFileError;
pub use run::{RunConfig, PROTOCOL_CHATTER_VERBOSITY};
pub use settings::{ConfigFile, LoggingSettings, MethodSettings};
