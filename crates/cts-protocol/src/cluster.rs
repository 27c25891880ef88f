//! Cluster-aware transport that follows `MOVED`/`ASK` redirects.
//!
//! Slot ownership is learned lazily from redirects rather than computed up
//! front; the corpus runs one command at a time, so the extra round trip on a
//! cold slot is irrelevant.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::Transport;
use crate::connection::{Connection, ConnectionConfig};
use crate::error::{ConnectionError, TransportError};
use crate::reply::Reply;

/// Redirect hops allowed for a single command.
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Redirect {
    Moved(String),
    Ask(String),
}

/// A set of node connections rooted at one seed node.
#[derive(Debug)]
pub struct ClusterConnection {
    config: ConnectionConfig,
    seed: String,
    current: String,
    nodes: BTreeMap<String, Connection>,
}

impl ClusterConnection {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let seed = Connection::connect(config)?;
        let addr = seed.addr().to_string();
        info!(seed = %addr, "connected to cluster seed node");
        let mut nodes = BTreeMap::new();
        nodes.insert(addr.clone(), seed);
        Ok(Self {
            config: config.clone(),
            seed: addr.clone(),
            current: addr,
            nodes,
        })
    }

    fn node(&mut self, addr: &str) -> Result<&mut Connection, TransportError> {
        if !self.nodes.contains_key(addr) {
            let (host, port) = split_addr(addr)
                .ok_or_else(|| TransportError::BadRedirect(addr.to_string()))?;
            let mut config = self.config.clone();
            config.host = host;
            config.port = port;
            let conn = Connection::connect(&config).map_err(|source| TransportError::Redirect {
                addr: addr.to_string(),
                source: Box::new(source),
            })?;
            debug!(node = %addr, "opened cluster node connection");
            self.nodes.insert(addr.to_string(), conn);
        }
        self.nodes
            .get_mut(addr)
            .ok_or_else(|| TransportError::BadRedirect(addr.to_string()))
    }

    /// Run one command on `addr`, forgetting the node if its socket failed.
    fn call(&mut self, addr: &str, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        let result = self.node(addr)?.execute(args);
        if let Err(err) = &result
            && !err.keeps_connection()
        {
            debug!(node = %addr, error = %err, "dropping cluster node connection");
            self.nodes.remove(addr);
        }
        result
    }

    /// Primary addresses listed by `CLUSTER NODES`, skipping failed nodes.
    fn primaries(&mut self) -> Result<Vec<String>, TransportError> {
        let seed = self.seed.clone();
        let reply = self.call(&seed, &[b"CLUSTER".to_vec(), b"NODES".to_vec()])?;
        let listing = reply
            .as_bytes()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .ok_or_else(|| {
                TransportError::Server(format!("unexpected CLUSTER NODES reply {reply}"))
            })?;
        Ok(parse_primaries(&listing))
    }
}

impl Transport for ClusterConnection {
    fn reset(&mut self) -> Result<(), TransportError> {
        for addr in self.primaries()? {
            self.call(&addr, &[b"FLUSHALL".to_vec()])?;
        }
        Ok(())
    }

    fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        let mut target = self.current.clone();
        let mut asking = false;
        for _ in 0..=MAX_REDIRECTS {
            if asking {
                self.call(&target, &[b"ASKING".to_vec()])?;
            }
            match self.call(&target, args) {
                Err(TransportError::Server(message)) => match parse_redirect(&message) {
                    Some(Redirect::Moved(addr)) => {
                        debug!(from = %target, to = %addr, "MOVED redirect");
                        self.current.clone_from(&addr);
                        target = addr;
                        asking = false;
                    }
                    Some(Redirect::Ask(addr)) => {
                        debug!(from = %target, to = %addr, "ASK redirect");
                        target = addr;
                        asking = true;
                    }
                    None => return Err(TransportError::Server(message)),
                },
                other => return other,
            }
        }
        Err(TransportError::TooManyRedirects(MAX_REDIRECTS))
    }
}

/// `MOVED <slot> <host:port>` or `ASK <slot> <host:port>`.
fn parse_redirect(message: &str) -> Option<Redirect> {
    let mut parts = message.split_whitespace();
    let kind = parts.next()?;
    let _slot = parts.next()?.parse::<u16>().ok()?;
    let addr = parts.next()?.to_string();
    match kind {
        "MOVED" => Some(Redirect::Moved(addr)),
        "ASK" => Some(Redirect::Ask(addr)),
        _ => None,
    }
}

/// Extract `host:port` of every healthy primary from a `CLUSTER NODES` listing.
///
/// The address field looks like `host:port@cport[,hostname]`.
fn parse_primaries(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (addr, flags) = (fields.get(1)?, fields.get(2)?);
            let flags: Vec<&str> = flags.split(',').collect();
            if !flags.contains(&"master") || flags.iter().any(|flag| flag.starts_with("fail")) {
                return None;
            }
            let addr = addr.split(['@', ',']).next()?;
            split_addr(addr).map(|(host, port)| format!("{host}:{port}"))
        })
        .collect()
}

fn split_addr(addr: &str) -> Option<(String, u16)> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}
