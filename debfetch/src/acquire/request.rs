//! Download requests and their retry policy.
//!
//! A [`DownloadRequest`] lives in exactly one method queue from enqueue until
//! it is resolved. Failures and redirects are handled by a two-generation
//! policy: a request first runs against the method's base URI and, if that
//! base is exhausted, once more against the fallback base.
//!
//! ```text
//!   primary base ──(failure or 11th redirect)──► fallback base ──(same)──► Error
//!        │                                            │
//!        └──────────────── 201 Done ──────────────────┴──────────────────► Got
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::checksums::ChecksumSet;

/// Redirects accepted on one base URI before the request counts as failed.
pub const MAX_REDIRECTS: u32 = 10;

/// Result a callback hands back to the coordinator.
pub type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Resolution callback, invoked exactly once per request.
pub type DownloadCallback = Box<dyn FnOnce(Delivery) -> CallbackResult>;

/// How a request was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The method fetched the file.
    Got {
        /// Where the method left the file. May differ from the destination.
        local_filename: PathBuf,
        /// Hashes and size reported by the method.
        checksums: ChecksumSet,
    },
    /// The request failed on every base it was allowed to try.
    Error {
        /// Last message reported by the method, if any.
        message: String,
    },
}

impl Outcome {
    pub fn is_got(&self) -> bool {
        matches!(self, Outcome::Got { .. })
    }
}

/// Everything a callback learns about a resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub outcome: Outcome,
    /// The URI as first enqueued, before any redirect or fallback.
    pub reported_uri: String,
    pub destination: PathBuf,
    /// Name of the method that handled the request.
    pub method: String,
}

/// What the retry policy decided after a failure or redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The request changed its target and must go back on the queue.
    Requeue,
    /// The request is finished and must be resolved as an error.
    Terminal,
}

/// One file to fetch.
pub struct DownloadRequest {
    uri: String,
    original_uri: String,
    relative_path: String,
    destination: PathBuf,
    callback: DownloadCallback,
    last_try: bool,
    redirect_count: u32,
}

impl DownloadRequest {
    /// Create a request for `relative_path` below `base_uri`.
    ///
    /// `has_fallback` decides whether a second generation is available.
    pub fn new(
        base_uri: &str,
        relative_path: &str,
        destination: PathBuf,
        has_fallback: bool,
        callback: DownloadCallback,
    ) -> Self {
        let uri = join_uri(base_uri, relative_path);
        Self {
            original_uri: uri.clone(),
            uri,
            relative_path: relative_path.to_string(),
            destination,
            callback,
            last_try: !has_fallback,
            redirect_count: 0,
        }
    }

    /// The URI currently sent to the method.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The URI the request was created with.
    pub fn original_uri(&self) -> &str {
        &self.original_uri
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Whether a failure now resolves the request for good.
    pub fn is_last_try(&self) -> bool {
        self.last_try
    }

    /// Redirects followed on the current base.
    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// Apply the failure rule.
    ///
    /// Switches to `fallback_base` unless this already is the last try.
    pub fn fail(&mut self, fallback_base: Option<&str>) -> RetryDecision {
        if self.last_try {
            return RetryDecision::Terminal;
        }
        self.last_try = true;
        match fallback_base {
            Some(base) => {
                self.uri = join_uri(base, &self.relative_path);
                self.redirect_count = 0;
                RetryDecision::Requeue
            }
            None => RetryDecision::Terminal,
        }
    }

    /// Follow a redirect, or fail once the redirect budget is spent.
    pub fn redirect(&mut self, new_uri: &str, fallback_base: Option<&str>) -> RetryDecision {
        if self.redirect_count < MAX_REDIRECTS {
            self.uri = new_uri.to_string();
            self.redirect_count += 1;
            RetryDecision::Requeue
        } else {
            self.fail(fallback_base)
        }
    }

    /// Hand the request to its callback, consuming it.
    pub fn resolve(self, method: &str, outcome: Outcome) -> CallbackResult {
        let delivery = Delivery {
            outcome,
            reported_uri: self.original_uri,
            destination: self.destination,
            method: method.to_string(),
        };
        (self.callback)(delivery)
    }
}

impl fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("uri", &self.uri)
            .field("original_uri", &self.original_uri)
            .field("destination", &self.destination)
            .field("last_try", &self.last_try)
            .field("redirect_count", &self.redirect_count)
            .finish()
    }
}

/// Join a base URI and a relative path with exactly one slash.
pub fn join_uri(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
