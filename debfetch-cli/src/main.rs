//! debfetch CLI - Command-line interface
//!
//! Fetches repository files through apt acquisition methods.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::index::IndexArgs;

#[derive(Parser)]
#[command(name = "debfetch")]
#[command(version = debfetch::VERSION)]
#[command(about = "Fetch Debian repository files through apt acquisition methods", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv method messages, -vvv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this config file instead of ~/.debfetch/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download files below a base URI
    Fetch(FetchArgs),

    /// Download index files of a suite
    Index(IndexArgs),

    /// Create the configuration file with defaults
    Init,

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let options = commands::common::GlobalOptions {
        verbosity: cli.verbose,
        config_path: cli.config,
    };

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(&options, args),
        Commands::Index(args) => commands::index::run(&options, args),
        Commands::Init => commands::init::run(),
        Commands::Config { command } => commands::config::run(&options, command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
