use bytes::Bytes;
use derivative::Derivative;
use std::sync::Arc;

use crate::consistency::Consistency;
use crate::retry::RetryPolicy;
use crate::types::RoutingKey;

/// Per-statement execution parameters.
#[derive(Default, Clone, Derivative)]
#[derivative(Debug)]
pub struct StatementParams {
    /// Statement consistency. Session default is used when not set.
    pub consistency: Option<Consistency>,
    /// Encoded bound values, passed to the transport as-is.
    pub values: Bytes,
    /// Is the query idempotent.
    pub is_idempotent: bool,
    /// Query keyspace. If not using a global one, setting it explicitly might help the load
    /// balancer use more appropriate hosts.
    pub keyspace: Option<String>,
    /// The partition key to use for token-aware routing.
    pub routing_key: Option<RoutingKey>,
    /// Custom statement retry policy.
    #[derivative(Debug = "ignore")]
    pub retry_policy: Option<Arc<dyn RetryPolicy + Send + Sync>>,
}
