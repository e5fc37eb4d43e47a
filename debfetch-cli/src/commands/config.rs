//! Configuration CLI commands.
//!
//! Provides `config path` and `config show` for inspecting the settings a
//! download run would use.

use clap::Subcommand;
use debfetch::config::config_file_path;

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective settings
    Show,
}

/// Run a config subcommand.
pub fn run(options: &GlobalOptions, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(options),
        ConfigCommands::Show => run_show(options),
    }
}

fn run_path(options: &GlobalOptions) -> Result<(), CliError> {
    let path = options.config_path.clone().unwrap_or_else(config_file_path);
    println!("{}", path.display());
    Ok(())
}

fn run_show(options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.load_config()?;
    let run_config = config.to_run_config();

    println!("[methods]");
    println!("  directory     = {}", config.methods.directory.display());
    if config.methods.config_items.is_empty() {
        println!("  config_items  = (default: {})", run_config.default_config_item);
    } else {
        println!("  config_items  = {}", config.methods.config_items.join(", "));
    }
    println!("  max_block_len = {}", config.methods.max_block_len);
    println!();
    println!("[logging]");
    println!(
        "  verbosity     = {}",
        options.effective_verbosity(&config)
    );
    println!("  directory     = {}", config.logging.directory.display());
    println!("  file          = {}", config.logging.file);
    Ok(())
}
