#![allow(dead_code)]

use nbtls::{Interest, Multiplexer, Readiness, Transport, TransportResult};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    ConnectStatus,
    Handshake,
    Write(usize),
    Read(usize),
    Restart,
    Close,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// Transport answering from per-operation scripts.
///
/// Once a script runs dry every operation succeeds: writes accept the whole
/// slice and reads return end of stream.
pub struct MockTransport {
    connect: VecDeque<TransportResult>,
    connect_status: VecDeque<TransportResult>,
    handshake: VecDeque<TransportResult>,
    write: VecDeque<TransportResult<usize>>,
    read: VecDeque<TransportResult<usize>>,
    restart: VecDeque<TransportResult>,
    calls: CallLog,
    os_error: i32,
    pair: [RawFd; 2],
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            connect: VecDeque::new(),
            connect_status: VecDeque::new(),
            handshake: VecDeque::new(),
            write: VecDeque::new(),
            read: VecDeque::new(),
            restart: VecDeque::new(),
            calls: Rc::new(RefCell::new(Vec::new())),
            os_error: 0,
            pair: socketpair(),
        }
    }

    pub fn connects(mut self, results: impl IntoIterator<Item = TransportResult>) -> Self {
        self.connect.extend(results);
        self
    }

    pub fn connect_statuses(mut self, results: impl IntoIterator<Item = TransportResult>) -> Self {
        self.connect_status.extend(results);
        self
    }

    pub fn handshakes(mut self, results: impl IntoIterator<Item = TransportResult>) -> Self {
        self.handshake.extend(results);
        self
    }

    pub fn writes(mut self, results: impl IntoIterator<Item = TransportResult<usize>>) -> Self {
        self.write.extend(results);
        self
    }

    pub fn reads(mut self, results: impl IntoIterator<Item = TransportResult<usize>>) -> Self {
        self.read.extend(results);
        self
    }

    pub fn restarts(mut self, results: impl IntoIterator<Item = TransportResult>) -> Self {
        self.restart.extend(results);
        self
    }

    /// OS error reported alongside every `Fatal` result.
    pub fn reports_os_error(mut self, code: i32) -> Self {
        self.os_error = code;
        self
    }

    pub fn log(&self) -> CallLog {
        self.calls.clone()
    }

    /// The other end of the socket pair the transport reports as its descriptor.
    pub fn peer(&self) -> RawFd {
        self.pair[1]
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> TransportResult {
        self.record(Call::Connect);
        self.connect.pop_front().unwrap_or(TransportResult::Success(()))
    }

    fn connect_status(&mut self) -> TransportResult {
        self.record(Call::ConnectStatus);
        self.connect_status.pop_front().unwrap_or(TransportResult::Success(()))
    }

    fn handshake(&mut self) -> TransportResult {
        self.record(Call::Handshake);
        self.handshake.pop_front().unwrap_or(TransportResult::Success(()))
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        self.record(Call::Write(buf.len()));
        self.write.pop_front().unwrap_or(TransportResult::Success(buf.len()))
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.record(Call::Read(buf.len()));
        let result = self.read.pop_front().unwrap_or(TransportResult::Success(0));

        if let TransportResult::Success(n) = result {
            for (i, byte) in buf.iter_mut().take(n).enumerate() {
                *byte = b'a' + (i % 26) as u8;
            }
        }

        result
    }

    fn restart(&mut self) -> TransportResult {
        self.record(Call::Restart);
        self.restart.pop_front().unwrap_or(TransportResult::Success(()))
    }

    fn close(&mut self) {
        self.record(Call::Close);
    }

    fn describe(&self, code: i32) -> String {
        format!("mock error {code}")
    }

    fn os_error(&self) -> i32 {
        self.os_error
    }
}

impl AsRawFd for MockTransport {
    fn as_raw_fd(&self) -> RawFd {
        self.pair[0]
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.pair[0]);
            libc::close(self.pair[1]);
        }
    }
}

pub fn socketpair() -> [RawFd; 2] {
    let mut fds = [0i32; 2];
    let res = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(res, 0, "socketpair() failed");
    fds
}

/// Multiplexer answering from a script; `Ready` once the script runs dry.
#[derive(Default)]
pub struct ScriptedMultiplexer {
    results: VecDeque<Readiness>,
    pub waits: Vec<Interest>,
}

impl ScriptedMultiplexer {
    pub fn new(results: impl IntoIterator<Item = Readiness>) -> Self {
        Self {
            results: results.into_iter().collect(),
            waits: Vec::new(),
        }
    }
}

impl Multiplexer for ScriptedMultiplexer {
    fn wait(&mut self, _file_descriptor: RawFd, interest: Interest, _deadline: Instant) -> Readiness {
        self.waits.push(interest);
        self.results.pop_front().unwrap_or(Readiness::Ready)
    }
}

pub fn count(log: &CallLog, matches: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|call| matches(call)).count()
}
