//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use debfetch::acquire::{
    AcquireError, CallbackResult, Delivery, MethodHandle, MethodRegistry, Outcome, RunReport,
};
use debfetch::config::ConfigFile;
use debfetch::logging::{init_logging, LoggingGuard};

use crate::error::CliError;

/// Options that apply to every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub verbosity: u8,
    pub config_path: Option<PathBuf>,
}

impl GlobalOptions {
    /// Load the config file named on the command line, or the default one.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        let config = match &self.config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        Ok(config)
    }

    /// Verbosity from `-v` flags, or from the config file if higher.
    pub fn effective_verbosity(&self, config: &ConfigFile) -> u8 {
        self.verbosity.max(config.logging.verbosity)
    }
}

/// Method selection shared by `fetch` and `index`.
#[derive(Debug, Args)]
pub struct MethodArgs {
    /// Base URI; its scheme selects the method program (e.g. http://deb.debian.org/debian)
    #[arg(long)]
    pub base: String,

    /// Fallback base URI tried once when the base fails
    #[arg(long)]
    pub fallback: Option<String>,

    /// key=value item sent to the method if it asks for configuration (repeatable)
    #[arg(long = "config-item", value_name = "KEY=VALUE")]
    pub config_items: Vec<String>,

    /// Directory containing method programs (default from config file)
    #[arg(long)]
    pub method_dir: Option<PathBuf>,

    /// Directory downloaded files are written to
    #[arg(long, default_value = ".")]
    pub dest_dir: PathBuf,
}

/// A registry with one method, ready for enqueuing.
pub struct Session {
    pub registry: MethodRegistry,
    pub method: MethodHandle,
    pub interrupt: CancellationToken,
    _logging: LoggingGuard,
}

impl Session {
    /// Load config, start logging, install the Ctrl+C handler and create
    /// the method described by `args`.
    pub fn open(options: &GlobalOptions, args: &MethodArgs) -> Result<Self, CliError> {
        let config = options.load_config()?;
        let verbosity = options.effective_verbosity(&config);
        let logging = init_logging(&config.logging.directory, &config.logging.file, verbosity)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let interrupt = CancellationToken::new();
        install_interrupt_handler(interrupt.clone())?;

        let mut run_config = config
            .to_run_config()
            .with_verbosity(verbosity)
            .with_interrupt(interrupt.clone());
        if let Some(dir) = &args.method_dir {
            run_config.method_dir = dir.clone();
        }

        let config_items = if args.config_items.is_empty() {
            config.methods.config_items.clone()
        } else {
            args.config_items.clone()
        };

        let mut registry = MethodRegistry::new(run_config);
        let method = registry.new_method(&args.base, args.fallback.as_deref(), &config_items)?;
        info!(base = %args.base, "Session ready");

        Ok(Self {
            registry,
            method,
            interrupt,
            _logging: logging,
        })
    }

    /// Run to completion, shut the methods down and print a summary.
    pub fn finish(self, bar: ProgressBar) -> Result<(), CliError> {
        let Session {
            mut registry,
            interrupt,
            _logging,
            ..
        } = self;

        let run_result = registry.run();
        let leftovers = registry.shutdown()?;
        bar.finish_and_clear();

        let mut report = match run_result {
            Ok(report) => report,
            Err(AcquireError::Interrupted) => RunReport::new(),
            Err(e) => return Err(e.into()),
        };
        report.merge(leftovers);

        print_summary(&report);
        if interrupt.is_cancelled() {
            return Err(CliError::Interrupted);
        }
        if !report.is_clean() {
            return Err(CliError::Incomplete {
                failed: report.failed.len(),
                errors: report.method_errors.len() + report.callback_errors.len(),
            });
        }
        Ok(())
    }
}

fn install_interrupt_handler(token: CancellationToken) -> Result<(), CliError> {
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, finishing transfers in progress...");
        token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// Progress bar counting resolved requests.
pub fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    bar.set_style(style);
    bar
}

/// Callback printing one line per resolved request.
pub fn report_to(bar: &ProgressBar) -> impl FnOnce(Delivery) -> CallbackResult + 'static {
    let bar = bar.clone();
    move |delivery| {
        bar.println(describe_delivery(&delivery));
        bar.inc(1);
        Ok(())
    }
}

/// One line describing a resolved request.
pub fn describe_delivery(delivery: &Delivery) -> String {
    match &delivery.outcome {
        Outcome::Got {
            local_filename,
            checksums,
        } => {
            let mut line = format!("Got {} -> {}", delivery.reported_uri, local_filename.display());
            if !checksums.is_empty() {
                line.push_str(&format!(" ({})", checksums));
            }
            line
        }
        Outcome::Error { message } => {
            format!("Err {} ({}): {}", delivery.reported_uri, delivery.method, message)
        }
    }
}

/// Destination for a remote path: its last component inside `dest_dir`.
pub fn destination_for(dest_dir: &Path, remote_path: &str) -> PathBuf {
    let name = remote_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("index");
    dest_dir.join(name)
}

fn print_summary(report: &RunReport) {
    for error in &report.method_errors {
        eprintln!("Warning: {}", error);
    }
    for error in &report.callback_errors {
        eprintln!("Warning: {}", error);
    }
    if report.unclaimed_children > 0 {
        eprintln!(
            "Warning: {} unexpected child process(es) exited",
            report.unclaimed_children
        );
    }
    println!("{}", report);
}
