//! Interface to the decompression helper pool.
//!
//! Decompression runs in child processes owned by a separate subsystem. The
//! coordinator's loop reaps every child of this process, so exits it cannot
//! match to a method are handed over here, and the loop keeps running while
//! the helper still has work.

use std::process::ExitStatus;

use super::error::AcquireResult;

/// What the coordinator needs from the decompression subsystem.
pub trait Uncompressor {
    /// Offer an exited child that no method owns.
    ///
    /// Returns `Ok(true)` if the child was one of the helper's.
    fn child_exited(&mut self, pid: u32, status: ExitStatus) -> AcquireResult<bool>;

    /// Whether the helper still has outstanding tasks.
    fn is_running(&self) -> bool;
}

/// Helper used when no decompression subsystem is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUncompressor;

impl Uncompressor for NoUncompressor {
    fn child_exited(&mut self, _pid: u32, _status: ExitStatus) -> AcquireResult<bool> {
        Ok(false)
    }

    fn is_running(&self) -> bool {
        false
    }
}
