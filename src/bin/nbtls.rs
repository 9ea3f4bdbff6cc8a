//! Command line TLS client.
//!
//! Sends the contents of a file to a TLS server and prints the response.
//!
//! # Usage
//!
//! ```sh
//! nbtls <server_ip> <port> <filename>
//! ```
//!
//! # Environment
//!
//! - `NBTLS_EXCHANGES`: `once` (default), a count, or `forever`
//! - `NBTLS_CA_FILE`: PEM file to verify the server with; unset disables verification
//! - `NBTLS_TIMEOUT_SECS`: deadline per exchange, default 180
//! - `RUST_LOG`: log filter, default `nbtls=info`

use std::io::Write;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use nbtls::trace::init_tracing;
use nbtls::transport::tls::{TlsConfig, TlsTransport};
use nbtls::{ConfigError, DEFAULT_DEADLINE, Driver, Exchanges, Poller, SessionBuilder, SessionError};
use thiserror::Error;
use tracing::info;

const USAGE: &str = "Usage: nbtls <server_ip> <port> <filename>";

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

struct Args {
    endpoint: SocketAddrV4,
    payload_path: String,
}

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(args) = parse_args(&args) else {
        println!("{USAGE}");
        std::process::exit(1);
    };

    if let Err(err) = run(args) {
        eprintln!("nbtls: {err}");
        std::process::exit(255);
    }
}

fn parse_args(args: &[String]) -> Option<Args> {
    let [_, ip, port, payload_path] = args else {
        return None;
    };

    let ip: Ipv4Addr = ip.parse().ok()?;
    let port: u16 = port.parse().ok()?;

    Some(Args {
        endpoint: SocketAddrV4::new(ip, port),
        payload_path: payload_path.clone(),
    })
}

fn run(args: Args) -> Result<(), CliError> {
    let payload = std::fs::read(&args.payload_path).map_err(|source| ConfigError::Load {
        path: args.payload_path.clone(),
        source,
    })?;

    let exchanges = match std::env::var("NBTLS_EXCHANGES") {
        Ok(value) => value.parse::<Exchanges>()?,
        Err(_) => Exchanges::Once,
    };

    let deadline = match std::env::var("NBTLS_TIMEOUT_SECS") {
        Ok(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidArgument {
                name: "NBTLS_TIMEOUT_SECS",
                value,
            })?,
        Err(_) => DEFAULT_DEADLINE,
    };

    let mut tls = TlsConfig::for_endpoint(args.endpoint);
    if let Ok(ca_file) = std::env::var("NBTLS_CA_FILE") {
        tls = tls.ca_file(ca_file);
    }

    let transport = TlsTransport::new(args.endpoint, &tls)?;
    let session = SessionBuilder::new()
        .payload(payload)
        .exchanges(exchanges)
        .on_chunk(|chunk| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(chunk);
            let _ = stdout.flush();
        })
        .build(transport)?;

    info!(endpoint = %args.endpoint, ?exchanges, "starting session");
    let report = Driver::new(session, Poller::new()).deadline(deadline).run()?;
    info!(
        exchanges = report.exchanges,
        sent = report.bytes_sent,
        received = report.bytes_received,
        "session finished"
    );

    Ok(())
}
