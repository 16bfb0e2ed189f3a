use futures::future::{join_all, select_all};
use futures::FutureExt;
use std::io;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::*;

use crate::cluster::topology::HostDistance;
use crate::cluster::ConnectionManager;
use crate::error::{Error, Result as DispatchResult};
use crate::transport::DispatchTransport;

const DEFAULT_MAX_REQUESTS_PER_CONNECTION: usize = 1024;
const DEFAULT_REMOTE_MAX_REQUESTS_PER_CONNECTION: usize = 256;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) async fn new_connection<T: DispatchTransport, CM: ConnectionManager<T>>(
    connection_manager: &CM,
    address: SocketAddr,
    timeout: Option<Duration>,
) -> DispatchResult<T> {
    if let Some(timeout) = timeout {
        tokio::time::timeout(timeout, connection_manager.connection(address))
            .await
            .map_err(|_| Error::Timeout(format!("Timeout waiting for connection to: {address}")))
            .and_then(|result| result)
    } else {
        connection_manager.connection(address).await
    }
}

/// Configuration for host connection pools. Local hosts get `local_size` connections, each
/// accepting up to `max_requests_per_connection` concurrent requests; remote hosts get the
/// (usually smaller) remote counterparts. Ignored hosts get no connections at all.
///
/// When every connection is at its cap, acquiring waits up to `acquire_timeout` for a request to
/// finish before failing with [`Error::PoolExhausted`].
#[derive(Clone, Copy, Debug)]
pub struct ConnectionPoolConfig {
    local_size: usize,
    remote_size: usize,
    max_requests_per_connection: usize,
    remote_max_requests_per_connection: usize,
    connect_timeout: Option<Duration>,
    acquire_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        ConnectionPoolConfig {
            local_size: 2,
            remote_size: 1,
            max_requests_per_connection: DEFAULT_MAX_REQUESTS_PER_CONNECTION,
            remote_max_requests_per_connection: DEFAULT_REMOTE_MAX_REQUESTS_PER_CONNECTION,
            connect_timeout: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl ConnectionPoolConfig {
    /// Creates a new configuration for pools of given sizes, with optional connect timeout.
    pub fn new(local_size: usize, remote_size: usize, connect_timeout: Option<Duration>) -> Self {
        assert!(local_size > 0 && remote_size > 0);
        ConnectionPoolConfig {
            local_size,
            remote_size,
            connect_timeout,
            ..Default::default()
        }
    }

    /// Sets the per-connection in-flight request caps for local and remote hosts.
    #[must_use]
    pub fn with_max_requests_per_connection(mut self, local: usize, remote: usize) -> Self {
        assert!(local > 0 && remote > 0);
        self.max_requests_per_connection = local;
        self.remote_max_requests_per_connection = remote;
        self
    }

    /// Sets how long to wait for a free connection when all are at their cap.
    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    #[inline]
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    #[inline]
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    /// Returns the number of connections and the per-connection cap for given distance.
    pub fn sizing(&self, distance: HostDistance) -> (usize, usize) {
        match distance {
            HostDistance::Local => (self.local_size, self.max_requests_per_connection),
            HostDistance::Remote => (self.remote_size, self.remote_max_requests_per_connection),
            HostDistance::Ignored => (0, 0),
        }
    }
}

struct PoolEntry<T> {
    transport: Arc<T>,
    in_flight: Arc<Semaphore>,
}

/// A connection checked out of a pool. The in-flight slot is given back when this is dropped, on
/// every exit path.
pub struct PooledConnection<T> {
    transport: Arc<T>,
    _permit: OwnedSemaphorePermit,
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.transport
    }
}

/// Fixed set of connections to a single host, sized by the host distance at creation time.
pub struct ConnectionPool<T: DispatchTransport> {
    address: SocketAddr,
    distance: HostDistance,
    connections: Vec<PoolEntry<T>>,
    current_index: AtomicUsize,
    acquire_timeout: Duration,
}

impl<T: DispatchTransport + 'static> ConnectionPool<T> {
    pub(crate) async fn new<CM: ConnectionManager<T>>(
        connection_manager: &CM,
        address: SocketAddr,
        distance: HostDistance,
        config: &ConnectionPoolConfig,
    ) -> DispatchResult<Self> {
        let (desired_size, max_requests) = config.sizing(distance);
        if desired_size == 0 {
            return Err(Error::HostUnavailable { addr: address });
        }

        let mut last_error = None;
        let connections: Vec<_> = join_all((0..desired_size).map(|_| {
            new_connection(connection_manager, address, config.connect_timeout())
        }))
        .await
        .into_iter()
        .filter_map(|connection| match connection {
            Ok(connection) => Some(PoolEntry {
                transport: Arc::new(connection),
                in_flight: Arc::new(Semaphore::new(max_requests)),
            }),
            Err(error) => {
                debug!(%error, %address, "Failed to establish pool connection.");
                last_error = Some(error);
                None
            }
        })
        .collect();

        if connections.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                Error::General(format!("No connections could be established to: {address}"))
            }));
        }

        if connections.len() != desired_size {
            warn!(
                %address,
                established = connections.len(),
                desired_size,
                "Not all pool connections could be established."
            );
        }

        Ok(ConnectionPool {
            address,
            distance,
            connections,
            current_index: AtomicUsize::new(0),
            acquire_timeout: config.acquire_timeout(),
        })
    }

    #[inline]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Distance this pool was sized for.
    #[inline]
    pub fn distance(&self) -> HostDistance {
        self.distance
    }

    /// Number of established connections.
    #[inline]
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.connections
            .iter()
            .all(|connection| connection.in_flight.is_closed())
    }

    /// Returns a connection with a free in-flight slot. Tries every connection round-robin, then
    /// waits for the first slot to free up on any of them.
    pub async fn acquire(&self) -> DispatchResult<PooledConnection<T>> {
        let pool_len = self.connections.len();
        let first_index = self.current_index.fetch_add(1, Ordering::Relaxed);
        let mut busy = Vec::with_capacity(pool_len);

        for offset in 0..pool_len {
            let connection = &self.connections[(first_index + offset) % pool_len];
            if connection.transport.is_broken() {
                continue;
            }

            match connection.in_flight.clone().try_acquire_owned() {
                Ok(permit) => {
                    return Ok(PooledConnection {
                        transport: connection.transport.clone(),
                        _permit: permit,
                    })
                }
                Err(TryAcquireError::NoPermits) => busy.push(connection),
                Err(TryAcquireError::Closed) => {
                    return Err(Error::HostUnavailable { addr: self.address })
                }
            }
        }

        if busy.is_empty() {
            // we've checked the whole pool and everything's down
            warn!(address = %self.address, "All connections down to host.");
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("No active connections to: {}", self.address),
            )));
        }

        trace!(address = %self.address, "All connections busy. Waiting for a free one.");

        let waiters = busy.into_iter().map(|connection| {
            let transport = connection.transport.clone();
            connection
                .in_flight
                .clone()
                .acquire_owned()
                .map(move |permit| permit.map(|permit| (transport, permit)))
                .boxed()
        });

        match tokio::time::timeout(self.acquire_timeout, select_all(waiters)).await {
            Ok((Ok((transport, permit)), _, _)) => Ok(PooledConnection {
                transport,
                _permit: permit,
            }),
            Ok((Err(_), _, _)) => Err(Error::HostUnavailable { addr: self.address }),
            Err(_) => {
                debug!(address = %self.address, "Connection pool exhausted.");
                Err(Error::PoolExhausted { addr: self.address })
            }
        }
    }

    /// Closes the pool. Pending and future acquisitions fail; requests already holding a
    /// connection are allowed to finish.
    pub(crate) fn close(&self) {
        for connection in &self.connections {
            connection.in_flight.close();
        }
    }
}
