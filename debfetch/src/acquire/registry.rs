//! The set of method processes for one coordinator lifetime and its run loop.
//!
//! One loop iteration:
//!
//! ```text
//!   reap exited children ─► start methods with new work ─► collect interest
//!          ▲                                                     │
//!          │                                                     ▼
//!   handle ready channels ◄──────────── poll(2) across all method channels
//! ```
//!
//! The loop ends when no method wants to read or write and the decompression
//! helper has nothing outstanding. Methods whose channels are closed get
//! `RunConfig::exit_grace` to exit; a child still running after that is
//! reaped by [`MethodRegistry::shutdown`].

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::channel::{Direction, PollSet, Ready};
use super::error::{AcquireError, AcquireResult};
use super::method::{resolve_request, MethodProcess};
use super::process::{reap_child, WaitMode};
use super::report::RunReport;
use super::request::{CallbackResult, Delivery, DownloadRequest, Outcome};
use super::uncompress::{NoUncompressor, Uncompressor};
use crate::config::RunConfig;

/// Message given to requests still queued when the registry shuts down.
const UNANSWERED_MESSAGE: &str = "method terminated before answering";

/// Handle to a method created by [`MethodRegistry::new_method`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle(usize);

impl MethodHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owns every method process and drives them to completion.
pub struct MethodRegistry {
    config: RunConfig,
    methods: Vec<MethodProcess>,
    uncompressor: Box<dyn Uncompressor>,
}

impl MethodRegistry {
    /// Create an empty registry.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            methods: Vec::new(),
            uncompressor: Box::new(NoUncompressor),
        }
    }

    /// Attach the decompression helper whose children share our reaping.
    pub fn with_uncompressor(mut self, uncompressor: impl Uncompressor + 'static) -> Self {
        self.uncompressor = Box::new(uncompressor);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Look up a method.
    pub fn method(&self, handle: MethodHandle) -> AcquireResult<&MethodProcess> {
        self.methods
            .get(handle.0)
            .ok_or(AcquireError::UnknownMethod(handle.0))
    }

    /// All methods in creation order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodProcess> {
        self.methods.iter()
    }

    /// Requests not yet resolved, across all methods.
    pub fn pending_requests(&self) -> usize {
        self.methods.iter().map(|m| m.queue().len()).sum()
    }

    /// Create a method for `uri`, named after its scheme.
    ///
    /// `config_items` are `key=value` strings sent once if the method asks
    /// for configuration; an empty list sends the default item instead.
    pub fn new_method(
        &mut self,
        uri: &str,
        fallback_uri: Option<&str>,
        config_items: &[String],
    ) -> AcquireResult<MethodHandle> {
        reject_line_break("method URI", uri)?;
        let name = parse_scheme(uri)?;

        if let Some(fallback) = fallback_uri {
            reject_line_break("fallback URI", fallback)?;
            let fallback_name = parse_scheme(fallback)?;
            if fallback_name != name {
                return Err(AcquireError::InvalidUri {
                    uri: fallback.to_string(),
                    reason: format!(
                        "fallback uses method '{}' but the base uses '{}'",
                        fallback_name, name
                    ),
                });
            }
        }

        let mut items = Vec::with_capacity(config_items.len().max(1));
        for item in config_items {
            if !item.contains('=') || item.contains(['\n', '\r']) {
                return Err(AcquireError::InvalidConfigItem(item.clone()));
            }
            items.push(item.clone());
        }
        if items.is_empty() {
            items.push(self.config.default_config_item.clone());
        }

        let handle = MethodHandle(self.methods.len());
        debug!(method = name, uri, fallback = ?fallback_uri, "Created method");
        self.methods.push(MethodProcess::new(
            name,
            uri,
            fallback_uri.map(str::to_string),
            items,
            self.config.max_block_len,
        ));
        Ok(handle)
    }

    /// Queue `relative_path` below the method's base URI for download to
    /// `destination`. The callback runs exactly once.
    pub fn enqueue<F>(
        &mut self,
        handle: MethodHandle,
        relative_path: &str,
        destination: impl Into<PathBuf>,
        callback: F,
    ) -> AcquireResult<()>
    where
        F: FnOnce(Delivery) -> CallbackResult + 'static,
    {
        let destination = destination.into();
        reject_line_break("path", relative_path)?;
        reject_line_break("destination", &destination.to_string_lossy())?;

        let method = self
            .methods
            .get_mut(handle.0)
            .ok_or(AcquireError::UnknownMethod(handle.0))?;
        let request = DownloadRequest::new(
            method.base_uri(),
            relative_path,
            destination,
            method.fallback_uri().is_some(),
            Box::new(callback),
        );
        method.enqueue(request);
        Ok(())
    }

    /// Queue an index file: `<base>/<suite>/<name><suffix>` is fetched to
    /// `<destination><download_suffix>`.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_indexed<F>(
        &mut self,
        handle: MethodHandle,
        suite: &str,
        name: &str,
        suffix: &str,
        destination: &Path,
        download_suffix: &str,
        callback: F,
    ) -> AcquireResult<()>
    where
        F: FnOnce(Delivery) -> CallbackResult + 'static,
    {
        let relative_path = format!("{}/{}{}", suite.trim_end_matches('/'), name, suffix);
        let mut target = destination.as_os_str().to_os_string();
        target.push(download_suffix);
        self.enqueue(handle, &relative_path, PathBuf::from(target), callback)
    }

    /// Run until every method is idle and the decompression helper is done.
    ///
    /// Method-scoped failures are collected in the report. Protocol errors,
    /// wait failures and cancellation end the run with an error.
    pub fn run(&mut self) -> AcquireResult<RunReport> {
        let mut report = RunReport::new();
        for method in &mut self.methods {
            method.begin_run();
        }
        info!(
            methods = self.methods.len(),
            pending = self.pending_requests(),
            "Starting download run"
        );

        let mut exit_deadline: Option<Instant> = None;
        loop {
            self.reap_exited(WaitMode::NoHang, &mut report)?;
            self.start_methods(&mut report);

            let cancelled = self.config.is_interrupted();
            let mut polls = PollSet::new();
            for (index, method) in self.methods.iter().enumerate() {
                if method.wants_read(cancelled) {
                    if let Some(fd) = method.read_fd() {
                        polls.register(index, fd, Direction::Read);
                    }
                }
                if method.wants_write(cancelled) {
                    if let Some(fd) = method.write_fd() {
                        polls.register(index, fd, Direction::Write);
                    }
                }
            }

            let helper_busy = self.uncompressor.is_running();
            if polls.is_empty() {
                let exiting = self.methods.iter().any(MethodProcess::is_exiting);
                if !helper_busy && !exiting {
                    break;
                }
                if helper_busy {
                    // Only helper children can make progress now.
                    if self.reap_exited(WaitMode::Block, &mut report)? == 0 {
                        warn!(exiting, "Expected helper children but none are left");
                        break;
                    }
                    continue;
                }
                // Only closed methods remain. A child that ignores EOF is left to shutdown().
                let deadline =
                    *exit_deadline.get_or_insert_with(|| Instant::now() + self.config.exit_grace);
                if Instant::now() >= deadline {
                    warn!(
                        grace = ?self.config.exit_grace,
                        "Closed methods did not exit, leaving them to shutdown"
                    );
                    break;
                }
                thread::sleep(self.config.reap_interval);
                continue;
            }
            exit_deadline = None;

            let timeout = helper_busy.then_some(self.config.reap_interval);
            let ready = polls.wait(timeout).map_err(AcquireError::Poll)?;
            for Ready { owner, direction } in ready {
                let method = &mut self.methods[owner];
                let result = match direction {
                    Direction::Read => method.on_readable(&self.config, &mut report),
                    Direction::Write => method.on_writable(&self.config),
                };
                if let Err(e) = result {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    report.method_errors.push(e);
                }
            }
        }

        if self.config.is_interrupted() {
            info!(pending = self.pending_requests(), "Download run interrupted");
            return Err(AcquireError::Interrupted);
        }
        info!(report = %report, pending = self.pending_requests(), "Download run finished");
        Ok(report)
    }

    /// Close every channel, wait for all method children, and resolve what
    /// is still queued as failed.
    pub fn shutdown(mut self) -> AcquireResult<RunReport> {
        let mut report = RunReport::new();
        for method in &mut self.methods {
            method.close_channels();
        }

        while self.methods.iter().any(|m| m.pid().is_some()) {
            match reap_child(WaitMode::Block).map_err(AcquireError::Wait)? {
                Some((pid, status)) => self.child_exited(pid, status, &mut report)?,
                None => {
                    warn!("Method children disappeared before they could be reaped");
                    break;
                }
            }
        }

        for method in &mut self.methods {
            let name = method.name().to_string();
            for request in method.drain_requests() {
                resolve_request(
                    &name,
                    request,
                    Outcome::Error {
                        message: UNANSWERED_MESSAGE.to_string(),
                    },
                    &mut report,
                );
            }
        }
        debug!(report = %report, "Registry shut down");
        Ok(report)
    }

    fn start_methods(&mut self, report: &mut RunReport) {
        for method in &mut self.methods {
            if !method.needs_start() {
                continue;
            }
            if self.config.is_interrupted() {
                debug!(method = method.name(), "Interrupted, not starting method");
                continue;
            }
            if let Err(e) = method.start(&self.config) {
                warn!(method = method.name(), error = %e, "Could not start method");
                report.method_errors.push(e);
            }
        }
    }

    /// Collect exited children. Returns how many were reaped.
    fn reap_exited(&mut self, mode: WaitMode, report: &mut RunReport) -> AcquireResult<usize> {
        let mut reaped = 0;
        let mut mode = mode;
        while let Some((pid, status)) = reap_child(mode).map_err(AcquireError::Wait)? {
            reaped += 1;
            self.child_exited(pid, status, report)?;
            mode = WaitMode::NoHang;
        }
        Ok(reaped)
    }

    fn child_exited(
        &mut self,
        pid: u32,
        status: std::process::ExitStatus,
        report: &mut RunReport,
    ) -> AcquireResult<()> {
        if let Some(method) = self.methods.iter_mut().find(|m| m.pid() == Some(pid)) {
            if let Some(e) = method.child_exited(status) {
                report.method_errors.push(e);
            }
            return Ok(());
        }
        match self.uncompressor.child_exited(pid, status) {
            Ok(true) => {}
            Ok(false) => {
                warn!(pid, status = %status, "Unexpected child died");
                report.unclaimed_children += 1;
            }
            Err(e) => report.method_errors.push(e),
        }
        Ok(())
    }
}

/// Extract the method name from the leading `[A-Za-z0-9_-]+:` of a URI.
pub fn parse_scheme(uri: &str) -> AcquireResult<&str> {
    let invalid = |reason: String| AcquireError::InvalidUri {
        uri: uri.to_string(),
        reason,
    };
    let end = uri
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(uri.len());
    if end == 0 {
        return Err(invalid("missing method name".to_string()));
    }
    match uri[end..].chars().next() {
        Some(':') => Ok(&uri[..end]),
        Some(c) => Err(invalid(format!("unexpected character '{}' in method name", c))),
        None => Err(invalid("missing ':' after method name".to_string())),
    }
}

fn reject_line_break(what: &'static str, value: &str) -> AcquireResult<()> {
    if value.contains(['\n', '\r']) {
        return Err(AcquireError::LineBreak {
            what,
            value: value.to_string(),
        });
    }
    Ok(())
}
