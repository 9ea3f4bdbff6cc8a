//! The per-connection state machine.
//!
//! A session runs `Connecting → Handshaking → Sending → Receiving`, then either
//! terminates or restarts from `Connecting` for another exchange. Each phase
//! calls the transport until it succeeds; a would-block result suspends the
//! session on exactly the direction the transport reported, and the same call
//! is retried on the next resume. Any fatal result terminates the session.

use crate::coroutine::{Coroutine, Resumable, Step};
use crate::error::{ConfigError, SessionError};
use crate::reactor::event::Interest;
use crate::transport::{Transport, TransportResult};

use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, trace, warn};

/// A session as driven by the outer loop.
pub type Session<T> = Coroutine<SessionContext<T>>;

/// Callback receiving every non-empty chunk as it arrives.
pub type ChunkSink = Box<dyn FnMut(&[u8])>;

/// Resumption point of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Connecting,
    /// Connect is in progress; resume checks the pending socket error.
    AwaitingConnect,
    Handshaking,
    Sending,
    Receiving,
    /// An exchange completed; decide between another exchange and termination.
    Restarting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connect",
            Phase::AwaitingConnect => "pending connect",
            Phase::Handshaking => "handshake",
            Phase::Sending => "send",
            Phase::Receiving => "receive",
            Phase::Restarting => "restart",
        };

        f.write_str(name)
    }
}

/// How many request/response exchanges a session performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exchanges {
    #[default]
    Once,
    Count(u32),
    Forever,
}

impl Exchanges {
    fn allows_another(self, completed: u64) -> bool {
        match self {
            Exchanges::Once => false,
            Exchanges::Count(limit) => completed < u64::from(limit),
            Exchanges::Forever => true,
        }
    }
}

impl FromStr for Exchanges {
    type Err = ConfigError;

    /// Parses `once`, `forever`, or a positive count.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidArgument {
            name: "exchange count",
            value: value.to_string(),
        };

        match value.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Exchanges::Once),
            "forever" => Ok(Exchanges::Forever),
            count => match count.parse::<u32>() {
                Ok(0) | Err(_) => Err(invalid()),
                Ok(1) => Ok(Exchanges::Once),
                Ok(count) => Ok(Exchanges::Count(count)),
            },
        }
    }
}

enum Flow {
    Advance(Phase),
    Suspend(Phase, Interest),
    Finish(Result<(), SessionError>),
}

/// Relays a transport result: the value on success, otherwise how the phase ends.
///
/// The direction is never inferred; it is the one the transport reported.
fn settle<U>(
    result: TransportResult<U>,
    resume_at: Phase,
    fail: impl FnOnce(i32) -> SessionError,
) -> Result<U, Flow> {
    match result {
        TransportResult::Success(value) => Ok(value),
        TransportResult::WouldBlockRead => Err(Flow::Suspend(resume_at, Interest::Read)),
        TransportResult::WouldBlockWrite => Err(Flow::Suspend(resume_at, Interest::Write)),
        TransportResult::Fatal(code) => Err(Flow::Finish(Err(fail(code)))),
    }
}

/// Everything a session keeps across suspensions.
pub struct SessionContext<T: Transport> {
    transport: T,
    payload: Box<[u8]>,
    receive_buffer: Box<[u8]>,
    response: Vec<u8>,
    on_chunk: Option<ChunkSink>,
    exchanges: Exchanges,

    bytes_sent: usize,
    last_chunk: usize,
    exchanges_completed: u64,
    total_sent: u64,
    total_received: u64,

    /// Set by a restart; the next connect first asks the transport for a
    /// fresh connection.
    reconnect_pending: bool,
    released: bool,
}

impl<T: Transport> SessionContext<T> {
    pub(crate) fn new(
        transport: T,
        payload: Box<[u8]>,
        receive_capacity: usize,
        exchanges: Exchanges,
        on_chunk: Option<ChunkSink>,
    ) -> Self {
        Self {
            transport,
            payload,
            receive_buffer: vec![0; receive_capacity].into_boxed_slice(),
            response: Vec::new(),
            on_chunk,
            exchanges,
            bytes_sent: 0,
            last_chunk: 0,
            exchanges_completed: 0,
            total_sent: 0,
            total_received: 0,
            reconnect_pending: false,
            released: false,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload bytes of the current exchange the transport has accepted.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Size of the most recent chunk read.
    pub fn last_chunk(&self) -> usize {
        self.last_chunk
    }

    pub fn receive_capacity(&self) -> usize {
        self.receive_buffer.len()
    }

    /// Bytes received in the current (or last completed) exchange.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    pub fn exchanges_completed(&self) -> u64 {
        self.exchanges_completed
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn connect(&mut self) -> Flow {
        if self.reconnect_pending {
            let result = self.transport.restart();
            if let Err(flow) = settle(result, Phase::Connecting, |code| {
                self.protocol_error(Phase::Restarting, code)
            }) {
                return flow;
            }

            self.reconnect_pending = false;
            debug!("fresh connection prepared");
        }

        let result = self.transport.connect();

        match settle(result, Phase::AwaitingConnect, |code| SessionError::Connect { code }) {
            Ok(()) => Flow::Advance(Phase::Handshaking),
            Err(flow) => flow,
        }
    }

    fn await_connect(&mut self) -> Flow {
        let result = self.transport.connect_status();

        match settle(result, Phase::AwaitingConnect, |code| SessionError::Connect { code }) {
            Ok(()) => Flow::Advance(Phase::Handshaking),
            Err(flow) => flow,
        }
    }

    fn handshake(&mut self) -> Flow {
        let result = self.transport.handshake();

        match settle(result, Phase::Handshaking, |code| {
            self.protocol_error(Phase::Handshaking, code)
        }) {
            Ok(()) => Flow::Advance(Phase::Sending),
            Err(flow) => flow,
        }
    }

    fn send(&mut self) -> Flow {
        loop {
            let remaining = self.payload.len() - self.bytes_sent;
            if remaining == 0 {
                return Flow::Advance(Phase::Receiving);
            }

            let result = self.transport.write(&self.payload[self.bytes_sent..]);
            let written = match settle(result, Phase::Sending, |code| {
                self.protocol_error(Phase::Sending, code)
            }) {
                Ok(written) => written,
                Err(flow) => return flow,
            };

            if written == 0 {
                return Flow::Finish(Err(SessionError::WriteZero));
            }

            let written = written.min(remaining);
            self.bytes_sent += written;
            self.total_sent += written as u64;
            trace!(written, sent = self.bytes_sent, total = self.payload.len(), "payload written");
        }
    }

    fn receive(&mut self) -> Flow {
        loop {
            let result = self.transport.read(&mut self.receive_buffer);
            let read = match settle(result, Phase::Receiving, |code| {
                self.protocol_error(Phase::Receiving, code)
            }) {
                Ok(read) => read.min(self.receive_buffer.len()),
                Err(flow) => return flow,
            };

            self.last_chunk = read;
            self.total_received += read as u64;

            if read > 0 {
                let chunk = &self.receive_buffer[..read];
                self.response.extend_from_slice(chunk);
                if let Some(sink) = self.on_chunk.as_mut() {
                    sink(chunk);
                }
            }

            trace!(read, capacity = self.receive_buffer.len(), "chunk received");

            // A full buffer means more may follow; anything shorter ends the message.
            if read < self.receive_buffer.len() {
                self.exchanges_completed += 1;
                info!(
                    exchange = self.exchanges_completed,
                    sent = self.bytes_sent,
                    received = self.response.len(),
                    "exchange complete"
                );
                return Flow::Advance(Phase::Restarting);
            }
        }
    }

    fn restart(&mut self) -> Flow {
        if !self.exchanges.allows_another(self.exchanges_completed) {
            return Flow::Finish(Ok(()));
        }

        info!(completed = self.exchanges_completed, "restarting for another exchange");
        self.reset();

        Flow::Advance(Phase::Connecting)
    }

    fn protocol_error(&self, phase: Phase, code: i32) -> SessionError {
        SessionError::Protocol {
            phase,
            code,
            detail: self.transport.describe(code),
            os: self.transport.os_error(),
        }
    }
}

impl<T: Transport> Resumable for SessionContext<T> {
    type Point = Phase;
    type Output = Result<(), SessionError>;

    fn step(&mut self, phase: &mut Phase) -> Step<Self::Output> {
        loop {
            let flow = match *phase {
                Phase::Connecting => self.connect(),
                Phase::AwaitingConnect => self.await_connect(),
                Phase::Handshaking => self.handshake(),
                Phase::Sending => self.send(),
                Phase::Receiving => self.receive(),
                Phase::Restarting => self.restart(),
            };

            match flow {
                Flow::Advance(next) => {
                    debug!(from = %phase, to = %next, "phase complete");
                    *phase = next;
                }
                Flow::Suspend(resume_at, interest) => {
                    trace!(phase = %resume_at, %interest, "suspended");
                    *phase = resume_at;
                    return Step::Suspended(interest);
                }
                Flow::Finish(outcome) => {
                    if let Err(err) = &outcome {
                        warn!(%err, phase = %phase, "session failed");
                    }
                    return Step::Terminated(outcome);
                }
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }

        self.released = true;
        self.transport.close();
        debug!(exchanges = self.exchanges_completed, "session released");
    }

    /// Abandons the current exchange. The connection is replaced on the next
    /// resume, before connecting again.
    fn reset(&mut self) {
        self.reconnect_pending = true;
        self.bytes_sent = 0;
        self.last_chunk = 0;
        self.response.clear();
    }
}

impl<T: Transport> fmt::Debug for SessionContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("payload_len", &self.payload.len())
            .field("receive_capacity", &self.receive_buffer.len())
            .field("bytes_sent", &self.bytes_sent)
            .field("last_chunk", &self.last_chunk)
            .field("exchanges_completed", &self.exchanges_completed)
            .field("reconnect_pending", &self.reconnect_pending)
            .field("released", &self.released)
            .finish()
    }
}
