use std::net::SocketAddr;

use crate::types::RoutingKey;

/// Resolves replicas owning a given partition. Token ring computation is left to the
/// implementation; the driver only consumes the resulting preference order.
pub trait TokenMap: Send + Sync {
    /// Returns replica addresses for given routing key, in preference order (primary replica
    /// first). An empty result means replicas could not be resolved.
    fn replicas(&self, keyspace: Option<&str>, routing_key: &RoutingKey) -> Vec<SocketAddr>;
}
