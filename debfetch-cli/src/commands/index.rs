//! Index command - download index files of a suite.
//!
//! Each name is fetched from `<base>/<suite>/<name><suffix>` and written to
//! `<dest-dir>/<name><download-suffix>`, with `/` in the name replaced by `_`.

use std::path::{Path, PathBuf};

use clap::Args;

use super::common::{progress_bar, report_to, GlobalOptions, MethodArgs, Session};
use crate::error::CliError;

/// Arguments for the index command.
#[derive(Debug, Args)]
pub struct IndexArgs {
    #[command(flatten)]
    pub method: MethodArgs,

    /// Suite directory below the base URI (e.g. dists/bookworm)
    #[arg(long)]
    pub suite: String,

    /// Suffix appended to each remote name (e.g. .gz)
    #[arg(long, default_value = "")]
    pub suffix: String,

    /// Suffix appended to each local file name
    #[arg(long, default_value = "")]
    pub download_suffix: String,

    /// Index names below the suite (e.g. Release, main/binary-amd64/Packages)
    #[arg(required = true)]
    pub names: Vec<String>,
}

/// Run the index command.
pub fn run(options: &GlobalOptions, args: IndexArgs) -> Result<(), CliError> {
    let mut session = Session::open(options, &args.method)?;
    let bar = progress_bar(args.names.len());

    for name in &args.names {
        let destination = local_index_path(&args.method.dest_dir, name);
        session.registry.enqueue_indexed(
            session.method,
            &args.suite,
            name,
            &args.suffix,
            &destination,
            &args.download_suffix,
            report_to(&bar),
        )?;
    }

    session.finish(bar)
}

/// Flatten an index name into a file name inside `dest_dir`.
fn local_index_path(dest_dir: &Path, name: &str) -> PathBuf {
    dest_dir.join(name.trim_matches('/').replace('/', "_"))
}
