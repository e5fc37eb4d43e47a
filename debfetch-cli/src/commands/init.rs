//! Init command - initialize configuration file.

use debfetch::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
pub fn run() -> Result<(), CliError> {
    let path = ConfigFile::ensure_exists()?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to change the method directory and logging.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
