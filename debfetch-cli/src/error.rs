//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use debfetch::acquire::AcquireError;
use debfetch::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Configuration file could not be loaded or saved
    ConfigFile(ConfigFileError),
    /// The coordinator failed
    Acquire(AcquireError),
    /// The run finished but not everything was retrieved
    Incomplete { failed: usize, errors: usize },
    /// Ctrl+C was pressed
    Interrupted,
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Acquire(AcquireError::Spawn { .. }) => {
                eprintln!();
                eprintln!("Method programs are looked up by URI scheme in the method directory.");
                eprintln!("  Install apt, or point --method-dir at a directory with http, ftp, ...");
            }
            CliError::Acquire(AcquireError::Protocol { .. }) => {
                eprintln!();
                eprintln!("The method spoke a protocol this version does not understand.");
                eprintln!("  Run with -vvv and check the log file for the offending block.");
            }
            _ => {}
        }

        match self {
            CliError::Interrupted => process::exit(130),
            _ => process::exit(1),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Acquire(e) => write!(f, "Download failed: {}", e),
            CliError::Incomplete { failed, errors } => write!(
                f,
                "{} download(s) failed, {} other error(s)",
                failed, errors
            ),
            CliError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Acquire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<AcquireError> for CliError {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Interrupted => CliError::Interrupted,
            other => CliError::Acquire(other),
        }
    }
}
