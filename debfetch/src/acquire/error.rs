//! Error types for the method coordinator.

use std::io;

use thiserror::Error;

use crate::checksums::ChecksumError;

/// Result type for coordinator operations.
pub type AcquireResult<T> = Result<T, AcquireError>;

/// Errors in what a method process sent us.
///
/// Any of these means the method speaks a dialect we do not understand,
/// so they abort the whole run.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The first line of a block is not `NNN text`.
    #[error("malformed status line '{0}'")]
    MalformedStatusLine(String),

    /// A header line is neither `Key: value` nor a continuation.
    #[error("malformed header line '{0}'")]
    MalformedField(String),

    /// The status code is not one we handle.
    #[error("unsupported status {code} '{line}'")]
    UnknownStatus { code: u16, line: String },

    /// A mandatory header is absent.
    #[error("status {code} is missing the '{field}' header")]
    MissingField { code: u16, field: &'static str },

    /// A header value could not be interpreted.
    #[error("invalid '{field}' header: {source}")]
    InvalidValue {
        field: &'static str,
        #[source]
        source: ChecksumError,
    },

    /// A header that ends up in a command or a path spans several lines.
    #[error("status {code} '{field}' header contains a line break")]
    MultiLineValue { code: u16, field: &'static str },

    /// Output contained a NUL byte.
    #[error("zero byte in output")]
    NulByte,

    /// A block grew beyond the configured limit without terminating.
    #[error("answer longer than {limit} bytes without a block terminator")]
    BlockTooLong { limit: usize },

    /// The method answered for a URI nobody asked it to fetch.
    #[error("status {code} for unexpected URI '{uri}'")]
    UnexpectedUri { code: u16, uri: String },
}

/// Errors that can occur while coordinating acquisition methods.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// A method URI could not be parsed.
    #[error("invalid method URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// A value that would be written into the protocol contains a line break.
    #[error("{what} '{value}' contains a line break")]
    LineBreak { what: &'static str, value: String },

    /// A configuration item is not of the form `key=value`.
    #[error("invalid configuration item '{0}': expected key=value")]
    InvalidConfigItem(String),

    /// A method handle does not belong to this registry.
    #[error("unknown method handle {0}")]
    UnknownMethod(usize),

    /// Starting the method program failed.
    #[error("failed to start method {method} ({program}): {source}")]
    Spawn {
        method: String,
        program: String,
        #[source]
        source: io::Error,
    },

    /// Setting up a channel to a method failed.
    #[error("failed to set up channel for method {method}: {source}")]
    Pipe {
        method: String,
        #[source]
        source: io::Error,
    },

    /// Reading from a method failed.
    #[error("error reading from method {method}: {source}")]
    Read {
        method: String,
        #[source]
        source: io::Error,
    },

    /// Writing to a method failed.
    #[error("error writing to method {method}: {source}")]
    Write {
        method: String,
        #[source]
        source: io::Error,
    },

    /// The readiness wait itself failed.
    #[error("waiting for method channels failed: {0}")]
    Poll(#[source] io::Error),

    /// Waiting for child processes failed.
    #[error("waiting for child processes failed: {0}")]
    Wait(#[source] io::Error),

    /// The method spoke something we do not understand.
    #[error("protocol error from method {method}: {source}")]
    Protocol {
        method: String,
        #[source]
        source: ProtocolError,
    },

    /// The method reported a general failure (status 401).
    #[error("method {method} reported general failure: {message}")]
    GeneralFailure { method: String, message: String },

    /// The method process exited with a failure status or by a signal.
    #[error("method {method} ({base_uri}) exited abnormally: {status}")]
    AbnormalExit {
        method: String,
        base_uri: String,
        status: String,
    },

    /// The decompression collaborator failed while reaping its child.
    #[error("uncompression helper failed: {0}")]
    Uncompress(String),

    /// Memory for a buffer could not be reserved.
    #[error("out of memory while buffering output of method {method}")]
    OutOfMemory { method: String },

    /// The run was cancelled.
    #[error("interrupted")]
    Interrupted,
}

impl AcquireError {
    /// Whether this error aborts the whole run rather than one method.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcquireError::Protocol { .. }
                | AcquireError::Poll(_)
                | AcquireError::Wait(_)
                | AcquireError::Interrupted
                | AcquireError::OutOfMemory { .. }
        )
    }

    /// Wrap a protocol error with the method it came from.
    pub(crate) fn protocol(method: &str, source: ProtocolError) -> Self {
        AcquireError::Protocol {
            method: method.to_string(),
            source,
        }
    }
}
