use derive_more::Constructor;

use crate::consistency::Consistency;
use crate::types::RoutingKey;

/// A request executed by a `Session`, as seen by load balancing.
#[derive(Constructor, Clone, Copy, Debug)]
pub struct Request<'a> {
    pub keyspace: Option<&'a str>,
    pub routing_key: Option<&'a RoutingKey>,
    pub consistency: Option<Consistency>,
}
