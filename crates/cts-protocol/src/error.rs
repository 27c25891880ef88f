use std::io;

use thiserror::Error;

/// Framing problems while decoding a reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RespError {
    #[error("unexpected frame prefix 0x{0:02x}")]
    UnknownPrefix(u8),
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("invalid integer {0:?}")]
    InvalidInteger(String),
    #[error("invalid double {0:?}")]
    InvalidDouble(String),
    #[error("invalid boolean {0:?}")]
    InvalidBoolean(String),
    #[error("line is not terminated by CRLF")]
    MissingCrlf,
    #[error("frame nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Failure of one `execute`/`reset` call against a connected target.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] RespError),
    /// An error reply from the server, e.g. `ERR wrong number of arguments`.
    #[error("{0}")]
    Server(String),
    #[error("connection closed by peer")]
    Closed,
    #[error("cannot send an empty command")]
    EmptyCommand,
    #[error("gave up after {0} cluster redirects")]
    TooManyRedirects(usize),
    #[error("cluster redirect is malformed: {0}")]
    BadRedirect(String),
    #[error("cannot reconnect to {addr}: {source}")]
    Reconnect {
        addr: String,
        #[source]
        source: Box<ConnectionError>,
    },
    #[error("cannot reach redirected node {addr}: {source}")]
    Redirect {
        addr: String,
        #[source]
        source: Box<ConnectionError>,
    },
}

impl TransportError {
    /// Whether the socket is still in step with the server after this error.
    ///
    /// Anything other than a complete error reply may leave a partial or late
    /// reply in flight, so the connection must be replaced.
    #[must_use]
    pub fn keeps_connection(&self) -> bool {
        matches!(self, Self::Server(_) | Self::EmptyCommand)
    }
}

/// Failure to establish a usable connection. Fatal for the run that needed it.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("TLS requested but this build lacks the `tls` feature")]
    TlsUnavailable,
    #[error("TLS handshake with {addr} failed: {detail}")]
    Tls { addr: String, detail: String },
    #[error("AUTH rejected: {0}")]
    Auth(String),
    #[error("PING handshake failed: {0}")]
    Handshake(String),
    #[error("cluster topology unavailable: {0}")]
    Topology(String),
}
