//! Starting method programs and reaping exited children.
//!
//! Children are reaped with `waitpid(-1)` rather than through
//! `std::process::Child`, because exits of processes started by the
//! decompression helper have to be collected by the same loop.

use std::collections::BTreeMap;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use super::channel::MethodChannels;

/// A freshly started method program.
#[derive(Debug)]
pub struct SpawnedChild {
    pub pid: u32,
    pub channels: MethodChannels,
}

/// Error from [`spawn_method`], split by the step that failed.
#[derive(Debug)]
pub enum SpawnError {
    /// Forking or executing the program failed.
    Start(io::Error),
    /// The child started but its pipes could not be set up.
    Pipe { pid: u32, source: io::Error },
}

/// Start `program` with no arguments and its stdin/stdout connected to us.
///
/// Standard error is inherited so method diagnostics reach the terminal.
pub fn spawn_method(
    program: &Path,
    environment: &BTreeMap<String, String>,
) -> Result<SpawnedChild, SpawnError> {
    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .envs(environment)
        .spawn()
        .map_err(SpawnError::Start)?;

    let pid = child.id();
    let pipe_error = || io::Error::new(io::ErrorKind::BrokenPipe, "child pipe missing");
    let stdin = child.stdin.take().ok_or_else(|| SpawnError::Pipe {
        pid,
        source: pipe_error(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| SpawnError::Pipe {
        pid,
        source: pipe_error(),
    })?;
    let channels =
        MethodChannels::new(stdin, stdout).map_err(|source| SpawnError::Pipe { pid, source })?;

    // Dropping `child` neither waits nor kills; the pid is reaped by `reap_child`.
    Ok(SpawnedChild { pid, channels })
}

/// Whether [`reap_child`] may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Return immediately if no child has exited.
    NoHang,
    /// Wait until some child exits.
    Block,
}

/// Collect one exited child of this process.
///
/// Returns `Ok(None)` when no child has exited yet (non-blocking mode) or
/// when there are no children at all.
pub fn reap_child(mode: WaitMode) -> io::Result<Option<(u32, ExitStatus)>> {
    let flags = match mode {
        WaitMode::NoHang => libc::WNOHANG,
        WaitMode::Block => 0,
    };
    loop {
        let mut status: libc::c_int = 0;
        // SAFETY: `status` is a valid out-pointer for the duration of the call.
        let pid = unsafe { libc::waitpid(-1, &mut status, flags) };
        if pid > 0 {
            return Ok(Some((pid as u32, ExitStatus::from_raw(status))));
        }
        if pid == 0 {
            return Ok(None);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ECHILD) => return Ok(None),
            _ => return Err(err),
        }
    }
}

/// Describe an unsuccessful exit, or `None` for exit code 0.
pub fn describe_failure(status: &ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }
    Some(match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => "unknown status".to_string(),
    })
}
