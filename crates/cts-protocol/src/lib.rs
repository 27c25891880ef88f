#![forbid(unsafe_code)]

//! Reply model and wire transport for driving a Redis-compatible target.

pub mod cluster;
pub mod connection;
pub mod error;
pub mod reply;
pub mod resp;
#[cfg(test)]
mod test_node;

pub use cluster::ClusterConnection;
pub use connection::{Connection, ConnectionConfig, DEFAULT_TIMEOUT};
pub use error::{ConnectionError, RespError, TransportError};
pub use reply::{Reply, cmp_replies};

/// The capability the conformance runner needs from a connected target.
pub trait Transport {
    /// Remove every key from every database the target serves.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Send one command and wait for its reply.
    fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        (**self).execute(args)
    }
}

/// Open a standalone or cluster transport depending on `config.cluster`.
pub fn connect(config: &ConnectionConfig) -> Result<Box<dyn Transport>, ConnectionError> {
    if config.cluster {
        Ok(Box::new(ClusterConnection::connect(config)?))
    } else {
        Ok(Box::new(Connection::connect(config)?))
    }
}
