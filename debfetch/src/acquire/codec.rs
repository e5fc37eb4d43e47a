//! Line protocol spoken with acquisition methods.
//!
//! Messages in both directions are blocks of lines terminated by an empty
//! line. The first line carries a three digit status code and free text,
//! the following lines are `Key: value` headers. Lines starting with a space
//! or tab continue the previous header.
//!
//! ```text
//! 201 URI Done
//! URI: http://example/pool/a/b.deb
//! Filename: /tmp/b.deb
//! MD5-Hash: 0123456789abcdef0123456789abcdef
//! Size: 1234
//!
//! ```
//!
//! [`BlockReader`] turns a byte stream into complete blocks,
//! [`Block`] gives access to the status and headers, and [`Command`] builds
//! the two request shapes we send.

use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use super::error::ProtocolError;

/// Bytes requested from a channel per read.
const READ_CHUNK: usize = 4096;

// =============================================================================
// Status codes
// =============================================================================

/// Status codes a method may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 100: self description, sent once after start.
    Capabilities,
    /// 101: free-form log line.
    Log,
    /// 102: progress message.
    Status,
    /// 103: the URI moved.
    Redirect,
    /// 200: transfer started.
    UriStart,
    /// 201: transfer finished.
    UriDone,
    /// 400: this URI cannot be fetched.
    UriFailure,
    /// 401: the method itself gave up.
    GeneralFailure,
}

impl StatusCode {
    /// Map a numeric code to a known status.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(StatusCode::Capabilities),
            101 => Some(StatusCode::Log),
            102 => Some(StatusCode::Status),
            103 => Some(StatusCode::Redirect),
            200 => Some(StatusCode::UriStart),
            201 => Some(StatusCode::UriDone),
            400 => Some(StatusCode::UriFailure),
            401 => Some(StatusCode::GeneralFailure),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StatusCode::Capabilities => 100,
            StatusCode::Log => 101,
            StatusCode::Status => 102,
            StatusCode::Redirect => 103,
            StatusCode::UriStart => 200,
            StatusCode::UriDone => 201,
            StatusCode::UriFailure => 400,
            StatusCode::GeneralFailure => 401,
        }
    }
}

// =============================================================================
// Incoming blocks
// =============================================================================

/// One parsed message from a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    code: u16,
    status_line: String,
    fields: Vec<(String, String)>,
}

impl Block {
    /// Parse the bytes of one block, without its terminating empty line.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(bytes);
        let mut lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line));

        let status_line = lines.next().unwrap_or_default();
        let code = parse_status_line(status_line)?;

        let mut fields: Vec<(String, String)> = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                match fields.last_mut() {
                    Some((_, value)) => {
                        value.push('\n');
                        value.push_str(line.trim());
                    }
                    None => return Err(ProtocolError::MalformedField(line.to_string())),
                }
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedField(line.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ProtocolError::MalformedField(line.to_string()));
            }
            fields.push((key.to_string(), value.trim().to_string()));
        }

        Ok(Self {
            code,
            status_line: status_line.to_string(),
            fields,
        })
    }

    /// Numeric status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Known status, if the code is one we handle.
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_code(self.code)
    }

    /// The complete first line.
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Header value by case-insensitive name. The first occurrence wins.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// First header present among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }

    /// Header value that must be present.
    pub fn require(&self, name: &'static str) -> Result<&str, ProtocolError> {
        self.field(name).ok_or(ProtocolError::MissingField {
            code: self.code,
            field: name,
        })
    }

    /// Interpret a header as a boolean flag. Absent means false.
    pub fn truth(&self, name: &str) -> bool {
        self.field(name)
            .map(|value| {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "yes" | "true" | "1" | "on"
                )
            })
            .unwrap_or(false)
    }

    /// All headers in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn parse_status_line(line: &str) -> Result<u16, ProtocolError> {
    let malformed = || ProtocolError::MalformedStatusLine(line.to_string());
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    if bytes.len() > 3 && bytes[3] != b' ' && bytes[3] != b'\t' {
        return Err(malformed());
    }
    line[..3].parse().map_err(|_| malformed())
}

// =============================================================================
// Framing
// =============================================================================

/// What a single read from a channel produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// This many bytes were appended.
    Data(usize),
    /// The peer closed its end.
    Eof,
}

/// Accumulates channel output and splits it into blocks.
///
/// A block ends at two consecutive newlines; carriage returns between them
/// do not break the run. Newlines before a block are skipped.
#[derive(Debug)]
pub struct BlockReader {
    buffer: Vec<u8>,
    scan_pos: usize,
    newline_run: usize,
    max_len: usize,
}

impl BlockReader {
    /// Creates a reader that rejects blocks longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scan_pos: 0,
            newline_run: 0,
            max_len,
        }
    }

    /// Bytes received but not yet part of a returned block.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Perform one read from `reader` into the buffer.
    ///
    /// `WouldBlock` and other I/O errors are passed through. Failing to grow
    /// the buffer is reported as `ErrorKind::OutOfMemory`.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R) -> io::Result<Fill> {
        let start = self.buffer.len();
        self.buffer
            .try_reserve(READ_CHUNK)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;
        self.buffer.resize(start + READ_CHUNK, 0);
        let result = loop {
            match reader.read(&mut self.buffer[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        match result {
            Ok(0) => {
                self.buffer.truncate(start);
                Ok(Fill::Eof)
            }
            Ok(n) => {
                self.buffer.truncate(start + n);
                Ok(Fill::Data(n))
            }
            Err(e) => {
                self.buffer.truncate(start);
                Err(e)
            }
        }
    }

    /// Append bytes directly.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take the next complete block, if one is buffered.
    pub fn next_block(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.scan_pos == 0 {
            let leading = self
                .buffer
                .iter()
                .take_while(|b| **b == b'\n' || **b == b'\r')
                .count();
            if leading > 0 {
                self.buffer.drain(..leading);
            }
        }

        while self.scan_pos < self.buffer.len() {
            let byte = self.buffer[self.scan_pos];
            match byte {
                0 => return Err(ProtocolError::NulByte),
                b'\n' => {
                    self.newline_run += 1;
                    if self.newline_run >= 2 {
                        let end = self.scan_pos;
                        let mut block: Vec<u8> = self.buffer.drain(..=end).collect();
                        block.pop();
                        self.scan_pos = 0;
                        self.newline_run = 0;
                        return Ok(Some(block));
                    }
                }
                b'\r' => {}
                _ => self.newline_run = 0,
            }
            self.scan_pos += 1;
        }

        if self.buffer.len() > self.max_len {
            return Err(ProtocolError::BlockTooLong {
                limit: self.max_len,
            });
        }
        Ok(None)
    }

    /// Drop all buffered state, as after a restart.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scan_pos = 0;
        self.newline_run = 0;
    }
}

// =============================================================================
// Outgoing commands
// =============================================================================

/// Commands sent to a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `601 Configuration` with one `Config-Item` per entry.
    Configuration(Vec<String>),
    /// `600 URI Acquire` for one file.
    Acquire { uri: String, filename: PathBuf },
}

impl Command {
    /// Serialize the command including its terminating empty line.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Command::Configuration(items) => {
                out.extend_from_slice(b"601 Configuration\n");
                for item in items {
                    out.extend_from_slice(b"Config-Item: ");
                    out.extend_from_slice(item.as_bytes());
                    out.push(b'\n');
                }
            }
            Command::Acquire { uri, filename } => {
                out.extend_from_slice(b"600 URI Acquire\nURI: ");
                out.extend_from_slice(uri.as_bytes());
                out.extend_from_slice(b"\nFilename: ");
                out.extend_from_slice(filename.as_os_str().as_bytes());
                out.push(b'\n');
            }
        }
        out.push(b'\n');
        out
    }
}

/// An encoded command that may take several writes to flush.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    bytes: Vec<u8>,
    written: usize,
}

impl PendingWrite {
    pub fn new(command: &Command) -> Self {
        Self {
            bytes: command.encode(),
            written: 0,
        }
    }

    /// Bytes still to be written.
    pub fn remaining(&self) -> &[u8] {
        &self.bytes[self.written..]
    }

    /// Record that `n` more bytes were written.
    pub fn advance(&mut self, n: usize) {
        self.written = (self.written + n).min(self.bytes.len());
    }

    pub fn is_done(&self) -> bool {
        self.written >= self.bytes.len()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}
