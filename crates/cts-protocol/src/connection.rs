//! Blocking standalone connection to a Redis-compatible server.

use std::io::{BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, warn};

use crate::Transport;
use crate::error::{ConnectionError, TransportError};
use crate::reply::Reply;
use crate::resp::{encode_command, read_reply};

/// Default connect/read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Sent with `AUTH` when non-empty.
    pub password: Option<String>,
    pub tls: bool,
    pub cluster: bool,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            tls: false,
            cluster: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn from_addr(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

trait Stream: Read + Write + Send {}
impl<T: Read + Write + Send> Stream for T {}

/// One socket with a buffered reader; writes go straight through.
///
/// After a transport failure the socket is marked broken and the next
/// command reconnects with the original config first.
pub struct Connection {
    config: ConnectionConfig,
    addr: String,
    stream: BufReader<Box<dyn Stream>>,
    write_buf: Vec<u8>,
    broken: bool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("addr", &self.addr)
            .field("broken", &self.broken)
            .finish()
    }
}

impl Connection {
    /// Connect, authenticate when a password is configured, and verify with `PING`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let addr = config.addr();
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|_| ConnectionError::Resolve(addr.clone()))?
            .next()
            .ok_or_else(|| ConnectionError::Resolve(addr.clone()))?;
        let tcp = TcpStream::connect_timeout(&socket_addr, config.timeout).map_err(|source| {
            ConnectionError::Connect {
                addr: addr.clone(),
                source,
            }
        })?;
        let configure = |tcp: &TcpStream| -> std::io::Result<()> {
            tcp.set_nodelay(true)?;
            tcp.set_read_timeout(Some(config.timeout))?;
            tcp.set_write_timeout(Some(config.timeout))
        };
        configure(&tcp).map_err(|source| ConnectionError::Connect {
            addr: addr.clone(),
            source,
        })?;

        let stream: Box<dyn Stream> = if config.tls {
            tls_stream(&config.host, &addr, tcp)?
        } else {
            Box::new(tcp)
        };

        let mut conn = Self {
            config: config.clone(),
            addr,
            stream: BufReader::new(stream),
            write_buf: Vec::with_capacity(1024),
            broken: false,
        };
        conn.handshake(config.password.as_deref())?;
        Ok(conn)
    }

    fn handshake(&mut self, password: Option<&str>) -> Result<(), ConnectionError> {
        if let Some(password) = password.filter(|password| !password.is_empty()) {
            let reply = self
                .execute(&[b"AUTH".to_vec(), password.as_bytes().to_vec()])
                .map_err(|err| ConnectionError::Auth(err.to_string()))?;
            if reply.as_bytes() != Some(b"OK".as_slice()) {
                return Err(ConnectionError::Auth(format!(
                    "unexpected AUTH reply {reply}"
                )));
            }
        }
        let reply = self
            .execute(&[b"PING".to_vec()])
            .map_err(|err| ConnectionError::Handshake(err.to_string()))?;
        if reply.as_bytes() != Some(b"PONG".as_slice()) {
            return Err(ConnectionError::Handshake(format!(
                "unexpected PING reply {reply}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        debug!(addr = %self.addr, "reconnecting after transport error");
        *self = Self::connect(&self.config).map_err(|source| TransportError::Reconnect {
            addr: self.addr.clone(),
            source: Box::new(source),
        })?;
        Ok(())
    }

    fn round_trip(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);
        let stream = self.stream.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        read_reply(&mut self.stream)
    }
}

impl Transport for Connection {
    fn reset(&mut self) -> Result<(), TransportError> {
        self.execute(&[b"FLUSHALL".to_vec()]).map(|_| ())
    }

    fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        if args.is_empty() {
            return Err(TransportError::EmptyCommand);
        }
        if self.broken {
            self.reconnect()?;
        }
        debug!(addr = %self.addr, argc = args.len(), "send command");
        let result = self.round_trip(args);
        if let Err(err) = &result
            && !err.keeps_connection()
        {
            warn!(addr = %self.addr, error = %err, "dropping connection");
            self.broken = true;
        }
        result
    }
}

#[cfg(feature = "tls")]
fn tls_stream(
    host: &str,
    addr: &str,
    tcp: TcpStream,
) -> Result<Box<dyn Stream>, ConnectionError> {
    use std::sync::Arc;

    let tls_err = |detail: String| ConnectionError::Tls {
        addr: addr.to_string(),
        detail,
    };
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|err| tls_err(format!("invalid server name: {err}")))?;
    let session = rustls::ClientConnection::new(Arc::new(tls_config), server_name)
        .map_err(|err| tls_err(err.to_string()))?;
    Ok(Box::new(rustls::StreamOwned::new(session, tcp)))
}

#[cfg(not(feature = "tls"))]
fn tls_stream(
    _host: &str,
    _addr: &str,
    _tcp: TcpStream,
) -> Result<Box<dyn Stream>, ConnectionError> {
    Err(ConnectionError::TlsUnavailable)
}
