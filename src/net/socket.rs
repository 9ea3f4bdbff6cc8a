//! Non-blocking IPv4 TCP socket.
//!
//! Provides the connection descriptor a session runs on: the socket handle
//! plus the resolved endpoint it connects to.
//!
//! # Usage
//!
//! ```no_run
//! use nbtls::net::socket::Socket;
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! # fn open() -> std::io::Result<()> {
//! let socket = Socket::open(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4433))?;
//! if !socket.connect()? {
//!     // connection in progress: wait for writability, then check take_error()
//! }
//! # Ok(())
//! # }
//! ```
use crate::reactor::event::set_nonblocking;

use libc::{
    AF_INET, EINPROGRESS, IPPROTO_TCP, SHUT_RDWR, SO_ERROR, SOCK_STREAM, SOL_SOCKET, close,
    connect, getsockopt, in_addr, recv, send, shutdown, sockaddr, sockaddr_in, socket, socklen_t,
};
use std::io;
use std::mem;
use std::net::SocketAddrV4;
use std::os::unix::io::{AsRawFd, RawFd};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: i32 = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: i32 = 0;

/// A non-blocking TCP socket bound to one IPv4 endpoint.
///
/// The descriptor is closed exactly once, when the socket is dropped.
#[derive(Debug)]
pub struct Socket {
    file_descriptor: RawFd,
    endpoint: SocketAddrV4,
}

impl Socket {
    /// Creates a non-blocking TCP socket for `endpoint` without connecting it.
    ///
    /// # Arguments
    /// * `endpoint` - Address the socket will connect to
    ///
    /// # Returns
    /// A [`Socket`] on success, or the OS error from `socket(2)`/`fcntl(2)`
    pub fn open(endpoint: SocketAddrV4) -> io::Result<Self> {
        let file_descriptor = unsafe { socket(AF_INET, SOCK_STREAM, IPPROTO_TCP) };
        if file_descriptor < 0 {
            return Err(io::Error::last_os_error());
        }

        // Owned from here on so the descriptor is closed on the error path too.
        let socket = Self {
            file_descriptor,
            endpoint,
        };
        set_nonblocking(file_descriptor)?;

        Ok(socket)
    }

    /// Starts a non-blocking connect.
    ///
    /// # Returns
    /// `Ok(true)` if the connection completed synchronously, `Ok(false)` if it
    /// is in progress (wait for writability, then call [`Self::take_error`]),
    /// or the OS error otherwise.
    pub fn connect(&self) -> io::Result<bool> {
        let addr = sockaddr_from(self.endpoint);
        let result = unsafe {
            connect(
                self.file_descriptor,
                &addr as *const sockaddr_in as *const sockaddr,
                mem::size_of::<sockaddr_in>() as socklen_t,
            )
        };

        if result == 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(EINPROGRESS) {
            return Ok(false);
        }

        Err(err)
    }

    /// Reads and clears the pending socket error (`SO_ERROR`).
    ///
    /// Zero means the in-progress connect succeeded.
    pub fn take_error(&self) -> io::Result<i32> {
        let mut pending: i32 = 0;
        let mut length = mem::size_of::<i32>() as socklen_t;
        let result = unsafe {
            getsockopt(
                self.file_descriptor,
                SOL_SOCKET,
                SO_ERROR,
                &mut pending as *mut i32 as *mut _,
                &mut length,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(pending)
    }

    /// Shuts down both directions. The descriptor stays open until drop.
    pub fn shutdown(&self) -> io::Result<()> {
        if unsafe { shutdown(self.file_descriptor, SHUT_RDWR) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }
}

impl io::Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let res = unsafe { recv(self.file_descriptor, buf.as_mut_ptr() as *mut _, buf.len(), 0) };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }
}

impl io::Write for Socket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res = unsafe {
            send(
                self.file_descriptor,
                buf.as_ptr() as *const _,
                buf.len(),
                SEND_FLAGS,
            )
        };

        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(res as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.file_descriptor
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        unsafe {
            close(self.file_descriptor);
        }
    }
}

fn sockaddr_from(endpoint: SocketAddrV4) -> sockaddr_in {
    let mut addr: sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = AF_INET as libc::sa_family_t;
    addr.sin_port = endpoint.port().to_be();
    addr.sin_addr = in_addr {
        s_addr: u32::from(*endpoint.ip()).to_be(),
    };

    addr
}
