//! Duplex byte channels to a method and the readiness wait across them.
//!
//! Each running method owns two pipe ends: the write end of the child's
//! standard input and the read end of its standard output. Both are switched
//! to non-blocking mode so that a read or write on a channel reported ready
//! never stalls the loop. [`PollSet`] collects the descriptors of every
//! method that has something to do and blocks in a single `poll(2)`.

use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::process::{ChildStdin, ChildStdout};
use std::time::Duration;

/// The two pipe ends connecting us to one method process.
#[derive(Debug)]
pub struct MethodChannels {
    to_method: ChildStdin,
    from_method: ChildStdout,
}

impl MethodChannels {
    /// Take ownership of the pipe ends and make them non-blocking.
    pub fn new(to_method: ChildStdin, from_method: ChildStdout) -> io::Result<Self> {
        set_nonblocking(to_method.as_raw_fd())?;
        set_nonblocking(from_method.as_raw_fd())?;
        Ok(Self {
            to_method,
            from_method,
        })
    }

    /// Descriptor we write commands to.
    pub fn write_fd(&self) -> RawFd {
        self.to_method.as_raw_fd()
    }

    /// Descriptor we read status blocks from.
    pub fn read_fd(&self) -> RawFd {
        self.from_method.as_raw_fd()
    }

    pub fn reader(&mut self) -> &mut ChildStdout {
        &mut self.from_method
    }

    /// Write as much of `bytes` as the pipe accepts right now.
    ///
    /// Returns 0 when the pipe is full.
    pub fn write_some(&mut self, bytes: &[u8]) -> io::Result<usize> {
        loop {
            match self.to_method.write(bytes) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
                Err(e) => return Err(e),
            }
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    // SAFETY: fd is owned by a live ChildStdin/ChildStdout for the duration
    // of both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

// =============================================================================
// Readiness wait
// =============================================================================

/// Which side of a method's channels a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A descriptor reported ready, tagged with the method slot that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    pub owner: usize,
    pub direction: Direction,
}

/// Descriptors of interest for one iteration of the run loop.
#[derive(Default)]
pub struct PollSet {
    fds: Vec<libc::pollfd>,
    owners: Vec<(usize, Direction)>,
}

impl PollSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add interest in `fd` for `owner`.
    pub fn register(&mut self, owner: usize, fd: RawFd, direction: Direction) {
        let events = match direction {
            Direction::Read => libc::POLLIN,
            Direction::Write => libc::POLLOUT,
        };
        self.fds.push(libc::pollfd {
            fd,
            events,
            revents: 0,
        });
        self.owners.push((owner, direction));
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Block until at least one descriptor is ready or `timeout` expires.
    ///
    /// Hang-ups and errors count as ready so the owner notices them on its
    /// next read or write. A wait interrupted by a signal returns nothing.
    pub fn wait(&mut self, timeout: Option<Duration>) -> io::Result<Vec<Ready>> {
        let timeout_ms = match timeout {
            Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
            None => -1,
        };
        // SAFETY: the pointer and length describe the live `fds` vector.
        let count = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if count < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err);
        }

        let ready_mask = libc::POLLIN | libc::POLLOUT | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
        Ok(self
            .fds
            .iter()
            .zip(&self.owners)
            .filter(|(pfd, _)| pfd.revents & ready_mask != 0)
            .map(|(_, (owner, direction))| Ready {
                owner: *owner,
                direction: *direction,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::io::FromRawFd;

    fn pipe() -> (std::fs::File, std::fs::File) {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0);
        unsafe {
            (
                std::fs::File::from_raw_fd(fds[0]),
                std::fs::File::from_raw_fd(fds[1]),
            )
        }
    }

    #[test]
    fn test_empty_poll_set() {
        let set = PollSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_writable_pipe_is_ready() {
        let (_read, write) = pipe();
        let mut set = PollSet::new();
        set.register(7, write.as_raw_fd(), Direction::Write);

        let ready = set.wait(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(
            ready,
            vec![Ready {
                owner: 7,
                direction: Direction::Write
            }]
        );
    }

    #[test]
    fn test_readable_only_after_data() {
        let (read, mut write) = pipe();
        let mut set = PollSet::new();
        set.register(1, read.as_raw_fd(), Direction::Read);
        assert!(set.wait(Some(Duration::from_millis(10))).unwrap().is_empty());

        write.write_all(b"x").unwrap();
        let mut set = PollSet::new();
        set.register(1, read.as_raw_fd(), Direction::Read);
        let ready = set.wait(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].direction, Direction::Read);
    }

    #[test]
    fn test_hangup_counts_as_ready() {
        let (read, write) = pipe();
        drop(write);
        let mut set = PollSet::new();
        set.register(3, read.as_raw_fd(), Direction::Read);
        let ready = set.wait(Some(Duration::from_millis(100))).unwrap();
        assert_eq!(ready.len(), 1);
    }

    #[test]
    fn test_set_nonblocking_on_empty_pipe() {
        let (mut read, _write) = pipe();
        set_nonblocking(read.as_raw_fd()).unwrap();
        let mut buf = [0u8; 8];
        let err = read.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }
}
