use libc::{F_GETFL, F_SETFL, O_NONBLOCK, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, fcntl, pollfd};
use std::fmt;
use std::io;
use std::os::unix::io::RawFd;

/// Direction a suspended session waits for.
///
/// Exactly one direction is requested per suspension; the multiplexer never
/// watches both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    /// Wait until the descriptor is readable.
    Read,
    /// Wait until the descriptor is writable.
    Write,
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interest::Read => f.write_str("readable"),
            Interest::Write => f.write_str("writable"),
        }
    }
}

impl Interest {
    fn poll_flags(self) -> i16 {
        match self {
            Interest::Read => POLLIN,
            Interest::Write => POLLOUT,
        }
    }
}

/// One-entry `pollfd` set, rebuilt for every wait.
pub(crate) struct PollEvent(pollfd);

impl PollEvent {
    pub(crate) fn new(file_descriptor: RawFd, interest: Interest) -> Self {
        Self(pollfd {
            fd: file_descriptor,
            events: interest.poll_flags(),
            revents: 0,
        })
    }

    /// Blocks for at most `timeout_ms` milliseconds.
    ///
    /// Returns the number of ready entries (0 or 1), or -1 with `errno` set.
    pub(crate) fn wait(&mut self, timeout_ms: i32) -> i32 {
        unsafe { libc::poll(&mut self.0, 1, timeout_ms) }
    }

    /// Error and hang-up conditions count as ready: the next transport call
    /// on the descriptor reports the actual failure.
    pub(crate) fn is_ready(&self) -> bool {
        self.0.revents & (self.0.events | POLLERR | POLLHUP | POLLNVAL) != 0
    }
}

pub(crate) fn set_nonblocking(file_descriptor: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(file_descriptor, F_GETFL) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { fcntl(file_descriptor, F_SETFL, flags | O_NONBLOCK) } == -1 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}
