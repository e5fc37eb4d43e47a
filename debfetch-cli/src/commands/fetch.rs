//! Fetch command - download files below a base URI.

use clap::Args;

use super::common::{destination_for, progress_bar, report_to, GlobalOptions, MethodArgs, Session};
use crate::error::CliError;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub method: MethodArgs,

    /// Paths relative to the base URI (e.g. pool/main/h/hello/hello_2.10-3_amd64.deb)
    #[arg(required = true)]
    pub paths: Vec<String>,
}

/// Run the fetch command.
pub fn run(options: &GlobalOptions, args: FetchArgs) -> Result<(), CliError> {
    let mut session = Session::open(options, &args.method)?;
    let bar = progress_bar(args.paths.len());

    for path in &args.paths {
        let destination = destination_for(&args.method.dest_dir, path);
        session
            .registry
            .enqueue(session.method, path, destination, report_to(&bar))?;
    }

    session.finish(bar)
}
