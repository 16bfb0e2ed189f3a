use std::net::SocketAddr;

use crate::future::BoxFuture;
use crate::transport::DispatchTransport;
use crate::Result;

/// Manages establishing connections to nodes. Implementations perform whatever handshake the
/// protocol requires and hand back a ready to use transport.
pub trait ConnectionManager<T: DispatchTransport>: Send + Sync {
    /// Tries to establish a new, ready to use connection.
    fn connection(&self, addr: SocketAddr) -> BoxFuture<Result<T>>;
}
