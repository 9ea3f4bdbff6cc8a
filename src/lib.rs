//! Non-blocking TLS client sessions driven as resumable state machines.
//!
//! A session connects, handshakes, sends a payload and reads the response over
//! a non-blocking socket. It never blocks: whenever the transport cannot make
//! progress the session suspends, naming the direction it waits for, and the
//! next resume continues exactly where it stopped.
//!
//! # Architecture
//!
//! - **Coroutine**: re-entrant step function plus its resumption point
//! - **Session**: the `Connecting → Handshaking → Sending → Receiving` machine
//! - **Transport**: connect/handshake/read/write reporting would-block outcomes;
//!   [`TlsTransport`] implements it with rustls
//! - **Poller**: deadline-bounded `poll(2)` on the session's one descriptor
//! - **Driver**: the outer loop alternating resume and wait
//! - **SessionBuilder**: fluent session configuration
//!
//! # Example
//!
//! ```no_run
//! use nbtls::{Driver, Poller, SessionBuilder};
//! use nbtls::transport::tls::{TlsConfig, TlsTransport};
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4433);
//! let transport = TlsTransport::new(endpoint, &TlsConfig::for_endpoint(endpoint))?;
//! let session = SessionBuilder::new().payload(b"ping".to_vec()).build(transport)?;
//!
//! let report = Driver::new(session, Poller::new()).run()?;
//! println!("{} bytes received", report.bytes_received);
//! # Ok(())
//! # }
//! ```
//!
//! [`TlsTransport`]: transport::tls::TlsTransport

mod builder;
pub mod coroutine;
mod driver;
mod error;
pub mod net;
pub mod reactor;
pub mod session;
pub mod trace;
pub mod transport;

pub use builder::{DEFAULT_RECEIVE_CAPACITY, SessionBuilder};
pub use coroutine::{Coroutine, Resumable, Step};
pub use driver::{DEFAULT_DEADLINE, Driver, Report};
pub use error::{ConfigError, SessionError};
pub use reactor::event::Interest;
pub use reactor::poller::{Multiplexer, Poller, Readiness};
pub use session::{Exchanges, Phase, Session, SessionContext};
pub use transport::{Transport, TransportResult};
