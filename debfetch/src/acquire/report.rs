//! Aggregated outcome of a coordinator run.

use std::fmt;

use super::error::AcquireError;

/// A request that was resolved as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub method: String,
    pub uri: String,
    pub message: String,
}

/// What happened during one or more runs of the registry.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Requests resolved with a retrieved file.
    pub completed: usize,
    /// Requests resolved as errors.
    pub failed: Vec<FailedDownload>,
    /// Errors returned by resolution callbacks.
    pub callback_errors: Vec<String>,
    /// Method-scoped failures: spawn and channel errors, 401, abnormal exits.
    pub method_errors: Vec<AcquireError>,
    /// Exited children that neither a method nor the decompression helper owned.
    pub unclaimed_children: usize,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing went wrong.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.callback_errors.is_empty() && self.method_errors.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: RunReport) {
        self.completed += other.completed;
        self.failed.extend(other.failed);
        self.callback_errors.extend(other.callback_errors);
        self.method_errors.extend(other.method_errors);
        self.unclaimed_children += other.unclaimed_children;
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} retrieved, {} failed, {} callback errors, {} method errors",
            self.completed,
            self.failed.len(),
            self.callback_errors.len(),
            self.method_errors.len()
        )
    }
}
