//! One acquisition method process and its protocol state.
//!
//! ```text
//!                 spawn              100 Capabilities
//!   NotStarted ──────────► AwaitingCapabilities ──────────► Ready
//!       ▲                                                     │
//!       │ clean exit                         abnormal exit,   │
//!       └─────────────────────────────────── I/O error, 401 ──┴──► Failed
//! ```
//!
//! A [`MethodProcess`] owns the child's channels, the buffers for partial
//! input and output, and the FIFO of requests routed to it. Requests are
//! pipelined: every request the send cursor reaches is written as soon as
//! the previous command has been flushed, and answers are matched back by
//! exact target URI.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use tracing::{debug, error, info, trace, warn};

use super::channel::MethodChannels;
use super::codec::{Block, BlockReader, Command, Fill, PendingWrite, StatusCode};
use super::error::{AcquireError, AcquireResult, ProtocolError};
use super::process::{describe_failure, spawn_method, SpawnError};
use super::queue::{RequestId, RequestQueue};
use super::report::{FailedDownload, RunReport};
use super::request::{DownloadRequest, Outcome, RetryDecision};
use crate::checksums::{ChecksumSet, HashKind};
use crate::config::RunConfig;

/// Protocol state of a method process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStatus {
    /// No child is running.
    NotStarted,
    /// The child runs and has not described itself yet.
    AwaitingCapabilities,
    /// The child accepts commands.
    Ready,
    /// The child broke down; it may be started again by a later run.
    Failed,
}

/// A method program bound to one base URI.
#[derive(Debug)]
pub struct MethodProcess {
    name: String,
    base_uri: String,
    fallback_uri: Option<String>,
    /// Configuration items not yet offered to a child.
    config: Option<Vec<String>>,
    /// Configuration the current child asked for and has not received.
    config_due: Option<Vec<String>>,
    status: MethodStatus,
    pid: Option<u32>,
    channels: Option<MethodChannels>,
    queue: RequestQueue,
    reader: BlockReader,
    pending: Option<PendingWrite>,
    started_this_run: bool,
}

impl MethodProcess {
    /// Create a method that has not been started.
    ///
    /// `config_items` must already contain at least the default item.
    pub fn new(
        name: impl Into<String>,
        base_uri: impl Into<String>,
        fallback_uri: Option<String>,
        config_items: Vec<String>,
        max_block_len: usize,
    ) -> Self {
        Self {
            name: name.into(),
            base_uri: base_uri.into(),
            fallback_uri,
            config: Some(config_items),
            config_due: None,
            status: MethodStatus::NotStarted,
            pid: None,
            channels: None,
            queue: RequestQueue::new(),
            reader: BlockReader::new(max_block_len),
            pending: None,
            started_this_run: false,
        }
    }

    /// Method name, which is also the URI scheme and the program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn fallback_uri(&self) -> Option<&str> {
        self.fallback_uri.as_deref()
    }

    pub fn status(&self) -> MethodStatus {
        self.status
    }

    /// Process id of the running (or not yet reaped) child.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the channels are closed and the child only awaits reaping.
    pub fn is_exiting(&self) -> bool {
        self.pid.is_some() && self.channels.is_none()
    }

    /// Whether configuration is still waiting for a child that asks for it.
    pub fn has_pending_config(&self) -> bool {
        self.config.is_some()
    }

    /// Unresolved requests.
    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub(crate) fn enqueue(&mut self, request: DownloadRequest) -> RequestId {
        debug!(method = %self.name, uri = %request.uri(), "Queued download");
        self.queue.push_back(request)
    }

    /// Forget which methods were started, at the beginning of a run.
    pub(crate) fn begin_run(&mut self) {
        self.started_this_run = false;
    }

    /// Whether this method should be spawned now.
    ///
    /// Each method is started at most once per run, and only if it has work.
    pub(crate) fn needs_start(&self) -> bool {
        matches!(self.status, MethodStatus::NotStarted | MethodStatus::Failed)
            && self.pid.is_none()
            && !self.started_this_run
            && !self.queue.is_empty()
    }

    /// Spawn the method program and move to `AwaitingCapabilities`.
    pub(crate) fn start(&mut self, config: &RunConfig) -> AcquireResult<()> {
        self.started_this_run = true;
        let program = config.method_dir.join(&self.name);
        debug!(method = %self.name, program = %program.display(), "Starting method");

        match spawn_method(&program, &config.environment) {
            Ok(child) => {
                self.pid = Some(child.pid);
                self.channels = Some(child.channels);
                self.status = MethodStatus::AwaitingCapabilities;
                self.queue.rewind();
                self.reader.reset();
                self.pending = None;
                self.config_due = None;
                info!(method = %self.name, pid = child.pid, "Method started");
                Ok(())
            }
            Err(SpawnError::Start(source)) => {
                self.status = MethodStatus::Failed;
                Err(AcquireError::Spawn {
                    method: self.name.clone(),
                    program: program.display().to_string(),
                    source,
                })
            }
            Err(SpawnError::Pipe { pid, source }) => {
                // The child runs without usable pipes; it is reaped like any other.
                self.pid = Some(pid);
                self.status = MethodStatus::Failed;
                Err(AcquireError::Pipe {
                    method: self.name.clone(),
                    source,
                })
            }
        }
    }

    // =========================================================================
    // Readiness interest
    // =========================================================================

    /// Whether the loop should wait for input from this method.
    pub(crate) fn wants_read(&self, cancelled: bool) -> bool {
        if self.channels.is_none() {
            return false;
        }
        match self.status {
            MethodStatus::AwaitingCapabilities => true,
            MethodStatus::Ready => {
                self.queue.in_flight() > 0 || (self.queue.has_unsent() && !cancelled)
            }
            MethodStatus::NotStarted | MethodStatus::Failed => false,
        }
    }

    /// Whether the loop should wait until this method accepts output.
    pub(crate) fn wants_write(&self, cancelled: bool) -> bool {
        if self.channels.is_none() || self.status != MethodStatus::Ready {
            return false;
        }
        self.pending.is_some()
            || (!cancelled && (self.config_due.is_some() || self.queue.has_unsent()))
    }

    pub(crate) fn read_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.channels.as_ref().map(MethodChannels::read_fd)
    }

    pub(crate) fn write_fd(&self) -> Option<std::os::unix::io::RawFd> {
        self.channels.as_ref().map(MethodChannels::write_fd)
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Flush as much of the current command as the channel takes.
    ///
    /// A new command is only built once the previous one is fully written,
    /// and never after cancellation was requested.
    pub(crate) fn on_writable(&mut self, config: &RunConfig) -> AcquireResult<()> {
        if self.channels.is_none() || self.status != MethodStatus::Ready {
            return Ok(());
        }
        if self.pending.is_none() {
            if config.is_interrupted() {
                debug!(method = %self.name, "Interrupted, not sending further commands");
                return Ok(());
            }
            let command = match self.next_command() {
                Some(command) => command,
                None => return Ok(()),
            };
            self.pending = Some(PendingWrite::new(&command));
        }

        let (channels, pending) = match (self.channels.as_mut(), self.pending.as_mut()) {
            (Some(channels), Some(pending)) => (channels, pending),
            _ => return Ok(()),
        };

        match channels.write_some(pending.remaining()) {
            Ok(n) => {
                pending.advance(n);
                trace!(
                    method = %self.name,
                    written = pending.written(),
                    total = pending.len(),
                    "Wrote to method"
                );
                if pending.is_done() {
                    self.pending = None;
                }
                Ok(())
            }
            Err(source) => {
                error!(method = %self.name, error = %source, "Error writing to method");
                self.tear_down();
                Err(AcquireError::Write {
                    method: self.name.clone(),
                    source,
                })
            }
        }
    }

    fn next_command(&mut self) -> Option<Command> {
        if let Some(items) = self.config_due.take() {
            debug!(method = %self.name, items = items.len(), "Sending configuration");
            return Some(Command::Configuration(items));
        }
        let (_, request) = self.queue.next_unsent()?;
        debug!(method = %self.name, uri = %request.uri(), "Requesting download");
        Some(Command::Acquire {
            uri: request.uri().to_string(),
            filename: request.destination().to_path_buf(),
        })
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Read what the method sent and act on every complete block.
    pub(crate) fn on_readable(
        &mut self,
        config: &RunConfig,
        report: &mut RunReport,
    ) -> AcquireResult<()> {
        let channels = match self.channels.as_mut() {
            Some(channels) => channels,
            None => return Ok(()),
        };

        match self.reader.fill_from(channels.reader()) {
            Ok(Fill::Data(n)) => trace!(method = %self.name, bytes = n, "Read from method"),
            Ok(Fill::Eof) => {
                debug!(method = %self.name, "Method closed its output");
                self.close_channels();
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::OutOfMemory => {
                self.tear_down();
                return Err(AcquireError::OutOfMemory {
                    method: self.name.clone(),
                });
            }
            Err(source) => {
                error!(method = %self.name, error = %source, "Error reading from method");
                self.tear_down();
                return Err(AcquireError::Read {
                    method: self.name.clone(),
                    source,
                });
            }
        }

        while self.channels.is_some() {
            let bytes = match self.reader.next_block() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(e) => return Err(self.protocol_failure(e)),
            };
            let block = Block::parse(&bytes).map_err(|e| self.protocol_failure(e))?;
            self.dispatch(&block, config, report)?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        block: &Block,
        config: &RunConfig,
        report: &mut RunReport,
    ) -> AcquireResult<()> {
        let status = match block.status() {
            Some(status) => status,
            None => {
                return Err(self.protocol_failure(ProtocolError::UnknownStatus {
                    code: block.code(),
                    line: block.status_line().to_string(),
                }))
            }
        };

        let result = match status {
            StatusCode::Capabilities => {
                self.on_capabilities(block);
                Ok(())
            }
            StatusCode::Log | StatusCode::Status | StatusCode::UriStart => {
                self.log_advisory(block, config);
                Ok(())
            }
            StatusCode::Redirect => self.on_redirect(block, report),
            StatusCode::UriDone => self.on_uri_done(block, report),
            StatusCode::UriFailure => self.on_uri_failure(block, report),
            StatusCode::GeneralFailure => return Err(self.on_general_failure(block)),
        };
        result.map_err(|e| self.protocol_failure(e))
    }

    fn on_capabilities(&mut self, block: &Block) {
        if self.status != MethodStatus::AwaitingCapabilities {
            debug!(method = %self.name, "Ignoring repeated capabilities");
            return;
        }
        let wants_config = block.truth("Send-Config");
        let payload = self.config.take();
        if wants_config {
            self.config_due = payload;
        }
        self.status = MethodStatus::Ready;
        debug!(
            method = %self.name,
            version = block.field("Version").unwrap_or("unknown"),
            wants_config,
            "Method ready"
        );
    }

    fn log_advisory(&self, block: &Block, config: &RunConfig) {
        let message = block.field("Message").unwrap_or("");
        let uri = block.field("URI").unwrap_or("");
        if config.shows_protocol_chatter() {
            info!(method = %self.name, uri, "{}: {}", block.status_line(), message);
        } else {
            trace!(method = %self.name, uri, "{}: {}", block.status_line(), message);
        }
    }

    fn on_uri_done(&mut self, block: &Block, report: &mut RunReport) -> Result<(), ProtocolError> {
        let uri = block.require("URI")?;
        let filename = block
            .first_field(&["Filename", "Alt-Filename"])
            .ok_or(ProtocolError::MissingField {
                code: block.code(),
                field: "Filename",
            })?;
        single_line(block.code(), "Filename", filename)?;

        let mut checksums = ChecksumSet::new();
        for kind in HashKind::ALL {
            if let Some(digest) = block.first_field(kind.accepted_fields()) {
                checksums
                    .set_hash(kind, digest)
                    .map_err(|source| ProtocolError::InvalidValue {
                        field: kind.field_name(),
                        source,
                    })?;
            }
        }
        if let Some(size) = block.field("Size") {
            checksums
                .set_size_str(size)
                .map_err(|source| ProtocolError::InvalidValue {
                    field: "Size",
                    source,
                })?;
        }

        let request = self.take_request(block.code(), uri)?;
        info!(method = %self.name, uri, filename, "Download complete");
        resolve_request(
            &self.name,
            request,
            Outcome::Got {
                local_filename: PathBuf::from(filename),
                checksums,
            },
            report,
        );
        Ok(())
    }

    fn on_uri_failure(
        &mut self,
        block: &Block,
        report: &mut RunReport,
    ) -> Result<(), ProtocolError> {
        let uri = block.require("URI")?;
        let message = block.field("Message").unwrap_or("unknown error");
        let id = self.find_request(block.code(), uri)?;

        let fallback = self.fallback_uri.as_deref();
        let decision = match self.queue.get_mut(id) {
            Some(request) => request.fail(fallback),
            None => return Err(unexpected_uri(block.code(), uri)),
        };
        match decision {
            RetryDecision::Requeue => {
                self.queue.requeue(id);
                warn!(method = %self.name, uri, message, "Download failed, trying fallback");
            }
            RetryDecision::Terminal => {
                let request = self.take_request(block.code(), uri)?;
                warn!(method = %self.name, uri, message, "Download failed");
                resolve_request(
                    &self.name,
                    request,
                    Outcome::Error {
                        message: message.to_string(),
                    },
                    report,
                );
            }
        }
        Ok(())
    }

    fn on_redirect(&mut self, block: &Block, report: &mut RunReport) -> Result<(), ProtocolError> {
        let uri = block.require("URI")?;
        let new_uri = block.require("New-URI")?;
        single_line(block.code(), "New-URI", new_uri)?;
        let id = self.find_request(block.code(), uri)?;

        let fallback = self.fallback_uri.as_deref();
        let decision = match self.queue.get_mut(id) {
            Some(request) => request.redirect(new_uri, fallback),
            None => return Err(unexpected_uri(block.code(), uri)),
        };
        match decision {
            RetryDecision::Requeue => {
                self.queue.requeue(id);
                debug!(method = %self.name, uri, new_uri, "Following redirect");
            }
            RetryDecision::Terminal => {
                let request = self.take_request(block.code(), uri)?;
                warn!(method = %self.name, uri, "Too many redirects");
                resolve_request(
                    &self.name,
                    request,
                    Outcome::Error {
                        message: "too many redirects".to_string(),
                    },
                    report,
                );
            }
        }
        Ok(())
    }

    fn on_general_failure(&mut self, block: &Block) -> AcquireError {
        let message = block
            .field("Message")
            .unwrap_or("unknown failure")
            .to_string();
        error!(method = %self.name, message = %message, "Method reported general failure");
        self.tear_down();
        AcquireError::GeneralFailure {
            method: self.name.clone(),
            message,
        }
    }

    fn find_request(&self, code: u16, uri: &str) -> Result<RequestId, ProtocolError> {
        self.queue
            .find_by_uri(uri)
            .ok_or_else(|| unexpected_uri(code, uri))
    }

    fn take_request(&mut self, code: u16, uri: &str) -> Result<DownloadRequest, ProtocolError> {
        let id = self.find_request(code, uri)?;
        self.queue
            .remove(id)
            .ok_or_else(|| unexpected_uri(code, uri))
    }

    fn protocol_failure(&mut self, source: ProtocolError) -> AcquireError {
        error!(method = %self.name, error = %source, "Protocol error");
        self.tear_down();
        AcquireError::protocol(&self.name, source)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close both channels. The child is still reaped later.
    pub(crate) fn close_channels(&mut self) {
        self.channels = None;
        self.pending = None;
    }

    fn tear_down(&mut self) {
        self.close_channels();
        self.config_due = None;
        self.status = MethodStatus::Failed;
    }

    /// Record the exit of this method's child.
    ///
    /// Returns the error to report if the exit was abnormal.
    pub(crate) fn child_exited(&mut self, status: ExitStatus) -> Option<AcquireError> {
        self.pid = None;
        self.close_channels();
        self.config_due = None;
        self.reader.reset();

        match describe_failure(&status) {
            Some(description) => {
                error!(
                    method = %self.name,
                    base_uri = %self.base_uri,
                    status = %description,
                    "Method exited abnormally"
                );
                self.status = MethodStatus::Failed;
                Some(AcquireError::AbnormalExit {
                    method: self.name.clone(),
                    base_uri: self.base_uri.clone(),
                    status: description,
                })
            }
            None => {
                debug!(method = %self.name, "Method exited");
                if self.status != MethodStatus::Failed {
                    self.status = MethodStatus::NotStarted;
                }
                None
            }
        }
    }

    /// Remove every unresolved request.
    pub(crate) fn drain_requests(&mut self) -> Vec<DownloadRequest> {
        self.queue.drain()
    }
}

/// Values copied into commands or paths must stay on one line.
fn single_line(code: u16, field: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.contains(['\n', '\r']) {
        return Err(ProtocolError::MultiLineValue { code, field });
    }
    Ok(())
}

fn unexpected_uri(code: u16, uri: &str) -> ProtocolError {
    ProtocolError::UnexpectedUri {
        code,
        uri: uri.to_string(),
    }
}

/// Hand a finished request to its callback and account for it.
pub(crate) fn resolve_request(
    method: &str,
    request: DownloadRequest,
    outcome: Outcome,
    report: &mut RunReport,
) {
    match &outcome {
        Outcome::Got { .. } => report.completed += 1,
        Outcome::Error { message } => report.failed.push(FailedDownload {
            method: method.to_string(),
            uri: request.original_uri().to_string(),
            message: message.clone(),
        }),
    }
    let uri = request.original_uri().to_string();
    if let Err(e) = request.resolve(method, outcome) {
        warn!(method, uri = %uri, error = %e, "Download callback failed");
        report.callback_errors.push(format!("{}: {}", uri, e));
    }
}
