//! Error types for sessions and their configuration.

use crate::reactor::event::Interest;
use crate::session::Phase;

use std::io;
use thiserror::Error;

/// Why a session terminated unsuccessfully.
///
/// Codes are kept as plain integers so the terminal status can be cloned and
/// handed out again by a finished coroutine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The non-blocking connect failed, synchronously or through `SO_ERROR`.
    #[error("connect failed: {}", os_text(.code))]
    Connect { code: i32 },

    /// Handshake, write or read reported neither success nor would-block.
    #[error("{phase} failed: transport error {code} ({detail}); last os error: {}", os_text(.os))]
    Protocol {
        phase: Phase,
        code: i32,
        detail: String,
        os: i32,
    },

    /// The transport reported success for a write without taking any bytes.
    #[error("transport accepted zero bytes of a non-empty payload")]
    WriteZero,

    /// The readiness wait hit its deadline.
    #[error("timed out waiting for the socket to become {interest}")]
    Timeout { interest: Interest },

    /// The readiness wait itself failed.
    #[error("readiness wait failed: {}", os_text(.os))]
    Multiplexer { os: i32 },
}

/// Errors raised while assembling a session, before any I/O happens.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("receive capacity must be at least one byte")]
    ZeroCapacity,

    #[error("invalid {name}: {value:?}")]
    InvalidArgument { name: &'static str, value: String },

    #[error("could not load {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("certificate file {path}: {detail}")]
    Certificate { path: String, detail: String },

    #[error("invalid server name {0:?}")]
    ServerName(String),

    #[error("tls configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn os_text(code: &i32) -> String {
    if *code == 0 {
        return "none".to_string();
    }

    io::Error::from_raw_os_error(*code).to_string()
}
