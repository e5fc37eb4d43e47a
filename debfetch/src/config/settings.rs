//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

use super::run::RunConfig;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Method program settings
    pub methods: MethodSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[methods]` section.
#[derive(Debug, Clone)]
pub struct MethodSettings {
    /// Directory containing the method executables
    pub directory: PathBuf,
    /// `key=value` items sent to methods that ask for configuration
    pub config_items: Vec<String>,
    /// Longest status block accepted from a method
    pub max_block_len: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Verbosity (0 = quiet)
    pub verbosity: u8,
    /// Directory for the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}

impl ConfigFile {
    /// Derive the run context for the method registry.
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig::new(self.methods.directory.clone())
            .with_verbosity(self.logging.verbosity)
            .with_max_block_len(self.methods.max_block_len)
    }
}
