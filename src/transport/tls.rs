//! rustls client transport over a non-blocking [`Socket`].
//!
//! TLS records move between rustls and the socket with `read_tls`/`write_tls`;
//! whenever the socket refuses to move bytes the operation reports the
//! direction it was blocked on instead of waiting.
//!
//! # Example
//!
//! ```no_run
//! use nbtls::transport::tls::{TlsConfig, TlsTransport};
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! # fn build() -> Result<(), nbtls::ConfigError> {
//! let endpoint = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 4433);
//! let config = TlsConfig::for_endpoint(endpoint).ca_file("ca-cert.pem");
//! let transport = TlsTransport::new(endpoint, &config)?;
//! # Ok(())
//! # }
//! ```

use crate::error::ConfigError;
use crate::net::socket::Socket;
use crate::transport::{Transport, TransportResult};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, ring, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddrV4};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Generic TLS failure.
pub const TLS_ERROR: i32 = -1;
/// The peer closed the connection without `close_notify`, or during the handshake.
pub const PEER_CLOSED: i32 = -2;
/// The server certificate was rejected.
pub const CERTIFICATE_ERROR: i32 = -3;
/// The peer sent a fatal alert.
pub const ALERT_RECEIVED: i32 = -4;
/// The transport has no socket (closed, or a restart failed).
pub const NOT_CONNECTED: i32 = -5;

const DEFAULT_PLAINTEXT_LIMIT: usize = 16 * 1024;

/// How to authenticate the server and size the plaintext buffer.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    server_name: ServerName<'static>,
    ca_file: Option<PathBuf>,
    plaintext_limit: usize,
}

impl TlsConfig {
    /// Uses `server_name` (DNS name or IP literal) for SNI and verification.
    pub fn new(server_name: &str) -> Result<Self, ConfigError> {
        let server_name = ServerName::try_from(server_name)
            .map_err(|_| ConfigError::ServerName(server_name.to_string()))?
            .to_owned();

        Ok(Self {
            server_name,
            ca_file: None,
            plaintext_limit: DEFAULT_PLAINTEXT_LIMIT,
        })
    }

    /// Names the server by the endpoint's IP address.
    pub fn for_endpoint(endpoint: SocketAddrV4) -> Self {
        Self {
            server_name: ServerName::from(IpAddr::V4(*endpoint.ip())),
            ca_file: None,
            plaintext_limit: DEFAULT_PLAINTEXT_LIMIT,
        }
    }

    /// Verifies the server against the certificates in this PEM file.
    ///
    /// Without a CA file the server certificate is not verified.
    pub fn ca_file(mut self, path: impl AsRef<Path>) -> Self {
        self.ca_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Upper bound on plaintext a single write may buffer.
    pub fn plaintext_limit(mut self, limit: usize) -> Self {
        self.plaintext_limit = limit.max(1);
        self
    }

    fn client_config(&self) -> Result<Arc<ClientConfig>, ConfigError> {
        let provider = Arc::new(ring::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let config = match &self.ca_file {
            Some(path) => builder
                .with_root_certificates(load_roots(path)?)
                .with_no_client_auth(),
            None => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
                .with_no_client_auth(),
        };

        Ok(Arc::new(config))
    }
}

fn load_roots(path: &Path) -> Result<RootCertStore, ConfigError> {
    let certificate_error = |detail: String| ConfigError::Certificate {
        path: path.display().to_string(),
        detail,
    };

    let mut roots = RootCertStore::empty();
    let certificates =
        CertificateDer::pem_file_iter(path).map_err(|err| certificate_error(err.to_string()))?;

    for certificate in certificates {
        let certificate = certificate.map_err(|err| certificate_error(err.to_string()))?;
        roots.add(certificate)?;
    }

    if roots.is_empty() {
        return Err(certificate_error("no certificates found".to_string()));
    }

    Ok(roots)
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// TLS client session over one [`Socket`].
pub struct TlsTransport {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    endpoint: SocketAddrV4,
    plaintext_limit: usize,
    socket: Option<Socket>,
    tls: ClientConnection,
    last_error: Option<String>,
    os_error: i32,
}

impl TlsTransport {
    /// Opens a non-blocking socket for `endpoint` and a fresh TLS client state.
    ///
    /// Nothing is sent until the session calls [`Transport::connect`].
    pub fn new(endpoint: SocketAddrV4, config: &TlsConfig) -> Result<Self, ConfigError> {
        let client_config = config.client_config()?;
        let tls = new_connection(&client_config, &config.server_name, config.plaintext_limit)?;
        let socket = Socket::open(endpoint)?;

        Ok(Self {
            config: client_config,
            server_name: config.server_name.clone(),
            endpoint,
            plaintext_limit: config.plaintext_limit,
            socket: Some(socket),
            tls,
            last_error: None,
            os_error: 0,
        })
    }

    pub fn endpoint(&self) -> SocketAddrV4 {
        self.endpoint
    }

    /// Pushes queued TLS records to the socket.
    fn flush(&mut self) -> TransportResult {
        while self.tls.wants_write() {
            let written = match self.socket.as_mut() {
                Some(socket) => self.tls.write_tls(socket),
                None => return TransportResult::Fatal(NOT_CONNECTED),
            };

            if let Err(err) = written {
                return self.io_failure(err, TransportResult::WouldBlockWrite);
            }
        }

        TransportResult::Success(())
    }

    /// Reads TLS records from the socket and processes them.
    ///
    /// `Success(0)` means the socket reached end of stream.
    fn receive_records(&mut self) -> TransportResult<usize> {
        let received = match self.socket.as_mut() {
            Some(socket) => self.tls.read_tls(socket),
            None => return TransportResult::Fatal(NOT_CONNECTED),
        };

        let received = match received {
            Ok(received) => received,
            Err(err) => return self.io_failure(err, TransportResult::WouldBlockRead),
        };

        if let Err(err) = self.tls.process_new_packets() {
            return TransportResult::Fatal(self.tls_failure(err));
        }

        trace!(received, "tls records processed");
        TransportResult::Success(received)
    }

    fn io_failure<T>(&mut self, err: io::Error, blocked: TransportResult<T>) -> TransportResult<T> {
        if matches!(
            err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ) {
            return blocked;
        }

        let code = err.raw_os_error().unwrap_or(TLS_ERROR);
        self.last_error = Some(err.to_string());
        self.os_error = err.raw_os_error().unwrap_or(0);

        TransportResult::Fatal(code)
    }

    fn tls_failure(&mut self, err: rustls::Error) -> i32 {
        let code = match &err {
            rustls::Error::InvalidCertificate(_) => CERTIFICATE_ERROR,
            rustls::Error::AlertReceived(_) => ALERT_RECEIVED,
            _ => TLS_ERROR,
        };
        debug!(%err, code, "tls failure");
        self.last_error = Some(err.to_string());
        self.os_error = 0;

        // The alert rustls queued for the peer goes out best effort.
        if let Some(socket) = self.socket.as_mut() {
            let _ = self.tls.write_tls(socket);
        }

        code
    }

    fn closed_by_peer(&mut self) -> i32 {
        self.last_error = Some("connection closed by peer".to_string());
        self.os_error = 0;
        PEER_CLOSED
    }
}

fn new_connection(
    config: &Arc<ClientConfig>,
    server_name: &ServerName<'static>,
    plaintext_limit: usize,
) -> Result<ClientConnection, rustls::Error> {
    let mut connection = ClientConnection::new(config.clone(), server_name.clone())?;
    connection.set_buffer_limit(Some(plaintext_limit));

    Ok(connection)
}

impl Transport for TlsTransport {
    fn connect(&mut self) -> TransportResult {
        let connected = match self.socket.as_ref() {
            Some(socket) => socket.connect(),
            None => return TransportResult::Fatal(NOT_CONNECTED),
        };

        match connected {
            Ok(true) => TransportResult::Success(()),
            Ok(false) => TransportResult::WouldBlockWrite,
            Err(err) => self.io_failure(err, TransportResult::WouldBlockWrite),
        }
    }

    fn connect_status(&mut self) -> TransportResult {
        let pending = match self.socket.as_ref() {
            Some(socket) => socket.take_error(),
            None => return TransportResult::Fatal(NOT_CONNECTED),
        };

        match pending {
            Ok(0) => TransportResult::Success(()),
            Ok(code) => {
                self.last_error = Some(io::Error::from_raw_os_error(code).to_string());
                self.os_error = code;
                TransportResult::Fatal(code)
            }
            Err(err) => self.io_failure(err, TransportResult::WouldBlockWrite),
        }
    }

    fn handshake(&mut self) -> TransportResult {
        loop {
            match self.flush() {
                TransportResult::Success(()) => {}
                other => return other,
            }

            if !self.tls.is_handshaking() {
                return TransportResult::Success(());
            }

            match self.receive_records() {
                TransportResult::Success(0) => return TransportResult::Fatal(self.closed_by_peer()),
                TransportResult::Success(_) => {}
                other => return other.map(|_| ()),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> TransportResult<usize> {
        match self.flush() {
            TransportResult::Success(()) => {}
            other => return other.map(|()| 0),
        }

        let accepted = match self.tls.writer().write(buf) {
            Ok(accepted) => accepted,
            Err(err) => return self.io_failure(err, TransportResult::WouldBlockWrite),
        };

        // Records that do not fit into the socket now are flushed by the next call.
        if let TransportResult::Fatal(code) = self.flush() {
            return TransportResult::Fatal(code);
        }

        TransportResult::Success(accepted)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        match self.flush() {
            TransportResult::Success(()) => {}
            other => return other.map(|()| 0),
        }

        let mut end_of_stream = false;

        loop {
            match self.tls.reader().read(buf) {
                Ok(read) => return TransportResult::Success(read),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return TransportResult::Fatal(self.closed_by_peer());
                }
                Err(err) => return self.io_failure(err, TransportResult::WouldBlockRead),
            }

            match self.receive_records() {
                TransportResult::Success(0) if end_of_stream => {
                    return TransportResult::Fatal(self.closed_by_peer());
                }
                TransportResult::Success(0) => end_of_stream = true,
                TransportResult::Success(_) => {}
                other => return other,
            }
        }
    }

    fn restart(&mut self) -> TransportResult {
        self.close();

        let tls = match new_connection(&self.config, &self.server_name, self.plaintext_limit) {
            Ok(tls) => tls,
            Err(err) => return TransportResult::Fatal(self.tls_failure(err)),
        };

        let socket = match Socket::open(self.endpoint) {
            Ok(socket) => socket,
            Err(err) => return self.io_failure(err, TransportResult::Fatal(NOT_CONNECTED)),
        };

        self.tls = tls;
        self.socket = Some(socket);
        self.last_error = None;
        self.os_error = 0;

        TransportResult::Success(())
    }

    fn close(&mut self) {
        let Some(mut socket) = self.socket.take() else {
            return;
        };

        if !self.tls.is_handshaking() {
            self.tls.send_close_notify();
            let _ = self.tls.write_tls(&mut socket);
        }

        if let Err(err) = socket.shutdown() {
            debug!(%err, "socket shutdown failed");
        }
    }

    fn describe(&self, code: i32) -> String {
        match &self.last_error {
            Some(text) => text.clone(),
            None if code > 0 => io::Error::from_raw_os_error(code).to_string(),
            None => format!("tls error {code}"),
        }
    }

    fn os_error(&self) -> i32 {
        self.os_error
    }
}

impl AsRawFd for TlsTransport {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_ref().map_or(-1, AsRawFd::as_raw_fd)
    }
}
