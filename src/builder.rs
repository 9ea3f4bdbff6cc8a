//! Fluent builder for sessions.
//!
//! Collects the payload, receive buffer size, exchange policy and chunk
//! callback, then binds them to an already constructed transport.

use crate::error::ConfigError;
use crate::session::{ChunkSink, Exchanges, Session, SessionContext};
use crate::transport::Transport;

/// Receive buffer size used unless configured otherwise.
pub const DEFAULT_RECEIVE_CAPACITY: usize = 255;

/// Builder for [`Session`] instances.
///
/// # Example
/// ```no_run
/// use nbtls::{Exchanges, SessionBuilder};
/// use nbtls::transport::tls::{TlsConfig, TlsTransport};
/// use std::net::{Ipv4Addr, SocketAddrV4};
///
/// # fn build() -> Result<(), nbtls::ConfigError> {
/// let endpoint = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4433);
/// let transport = TlsTransport::new(endpoint, &TlsConfig::for_endpoint(endpoint))?;
/// let session = SessionBuilder::new()
///     .payload(b"GET / HTTP/1.0\r\n\r\n".to_vec())
///     .exchanges(Exchanges::Count(3))
///     .build(transport)?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    payload: Vec<u8>,
    receive_capacity: usize,
    exchanges: Exchanges,
    on_chunk: Option<ChunkSink>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Creates a builder with an empty payload, a single exchange and the
    /// default receive capacity.
    pub fn new() -> Self {
        Self {
            payload: Vec::new(),
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
            exchanges: Exchanges::Once,
            on_chunk: None,
        }
    }

    /// Bytes sent once per exchange.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Size of the receive buffer. A chunk shorter than this ends a response.
    pub fn receive_capacity(mut self, capacity: usize) -> Self {
        self.receive_capacity = capacity;
        self
    }

    pub fn exchanges(mut self, exchanges: Exchanges) -> Self {
        self.exchanges = exchanges;
        self
    }

    /// Called with every non-empty chunk as soon as it is read.
    pub fn on_chunk(mut self, sink: impl FnMut(&[u8]) + 'static) -> Self {
        self.on_chunk = Some(Box::new(sink));
        self
    }

    /// Binds the configuration to `transport`.
    ///
    /// # Returns
    /// A session positioned at its first phase, or a [`ConfigError`] if the
    /// receive capacity is zero or the exchange count is zero
    pub fn build<T: Transport>(self, transport: T) -> Result<Session<T>, ConfigError> {
        if self.receive_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        if self.exchanges == Exchanges::Count(0) {
            return Err(ConfigError::InvalidArgument {
                name: "exchange count",
                value: "0".to_string(),
            });
        }

        let context = SessionContext::new(
            transport,
            self.payload.into_boxed_slice(),
            self.receive_capacity,
            self.exchanges,
            self.on_chunk,
        );

        Ok(Session::new(context))
    }
}
