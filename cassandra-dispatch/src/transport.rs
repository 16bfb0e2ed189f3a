//! Transport seam of the driver. Framing, socket handling and (de)serialization of requests all
//! live behind [`DispatchTransport`]; the routing core only sees decoded message values.
use std::net::SocketAddr;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use std::sync::Arc;

use crate::frame::{RequestBody, ResponseBody};
use crate::future::BoxFuture;
use crate::Result;

/// A single established connection to a node.
pub trait DispatchTransport: Send + Sync {
    /// Sends a request and waits for the response. Server-side failures are returned as
    /// [`ResponseBody::Error`]; `Err` is reserved for transport failures (connection reset,
    /// read timeout, etc.).
    fn send<'a>(&'a self, request: &'a RequestBody) -> BoxFuture<'a, Result<ResponseBody>>;

    /// Checks if the connection is broken (e.g. after read or write errors)
    fn is_broken(&self) -> bool;

    /// Returns associated node address
    fn address(&self) -> SocketAddr;
}

/// Connection which never answers requests. Pool tests only look at its address and health.
#[cfg(test)]
pub(crate) struct IdleTransport {
    address: SocketAddr,
    broken: Arc<AtomicBool>,
}

#[cfg(test)]
impl IdleTransport {
    pub fn new(address: SocketAddr) -> Self {
        Self::with_broken_flag(address, Default::default())
    }

    /// Creates a transport whose health follows a flag shared with the test.
    pub fn with_broken_flag(address: SocketAddr, broken: Arc<AtomicBool>) -> Self {
        IdleTransport { address, broken }
    }
}

#[cfg(test)]
impl DispatchTransport for IdleTransport {
    fn send<'a>(&'a self, _request: &'a RequestBody) -> BoxFuture<'a, Result<ResponseBody>> {
        Box::pin(futures::future::pending())
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    fn address(&self) -> SocketAddr {
        self.address
    }
}
