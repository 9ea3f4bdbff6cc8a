//! The transport capability a session drives.
//!
//! Every operation is non-blocking and reports one of four outcomes. Only the
//! two would-block outcomes are retryable: the session suspends on the
//! direction the transport named and retries the same call after the
//! descriptor is ready. Anything else ends the session.
//!
//! - [`tls`]: rustls client over a [`Socket`](crate::net::socket::Socket)

pub mod tls;

use std::os::unix::io::AsRawFd;

/// Tagged result of a transport call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportResult<T = ()> {
    Success(T),
    /// Retry once the descriptor is readable.
    WouldBlockRead,
    /// Retry once the descriptor is writable.
    WouldBlockWrite,
    /// Not retryable. The code is transport specific, see [`Transport::describe`].
    Fatal(i32),
}

impl<T> TransportResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TransportResult<U> {
        match self {
            TransportResult::Success(value) => TransportResult::Success(f(value)),
            TransportResult::WouldBlockRead => TransportResult::WouldBlockRead,
            TransportResult::WouldBlockWrite => TransportResult::WouldBlockWrite,
            TransportResult::Fatal(code) => TransportResult::Fatal(code),
        }
    }
}

/// Connect, handshake, write and read over one non-blocking descriptor.
///
/// The descriptor returned by [`AsRawFd`] is what the multiplexer waits on; it
/// may change after [`Transport::restart`].
pub trait Transport: AsRawFd {
    /// Starts connecting. `WouldBlockWrite` means the connect is in progress.
    fn connect(&mut self) -> TransportResult;

    /// Checks an in-progress connect once the descriptor became writable.
    fn connect_status(&mut self) -> TransportResult;

    /// Advances the handshake as far as the descriptor allows.
    fn handshake(&mut self) -> TransportResult;

    /// Writes a prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> TransportResult<usize>;

    /// Reads into `buf`. `Success(0)` means the peer closed the session cleanly.
    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    /// Tears the current connection down and prepares a fresh, unconnected one.
    fn restart(&mut self) -> TransportResult;

    /// Releases the connection. Called once per session.
    fn close(&mut self);

    /// Human readable text for a code reported through `Fatal`.
    fn describe(&self, code: i32) -> String {
        if code > 0 {
            return std::io::Error::from_raw_os_error(code).to_string();
        }

        format!("transport error {code}")
    }

    /// OS error behind the most recent `Fatal` result, or 0 when that failure
    /// did not come from a system call.
    fn os_error(&self) -> i32 {
        0
    }
}
