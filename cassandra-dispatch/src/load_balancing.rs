//! Load balancing policies decide which hosts receive a request, in which order, and how many
//! connections the driver keeps to each of them.
//!
//! Available policies:
//!
//! * [`RoundRobinPolicy`] - rotates fairly over all eligible hosts, with distances assigned by a
//!   [`HostDistanceEvaluator`](host_distance_evaluator::HostDistanceEvaluator).
//! * [`DcAwareRoundRobinPolicy`] - prefers hosts from the local datacenter and keeps a capped
//!   number of hosts from each remote datacenter as failover candidates.
//! * [`TokenAwarePolicy`] - wraps another policy and puts replicas for the request routing key
//!   first.
//! * [`WhiteListPolicy`] - wraps another policy and restricts it to a fixed set of hosts.
//!
//! Every policy excludes `Down` hosts and `Ignored` hosts from its plans. The check is done when
//! the plan is advanced, not when it's created, so a long-running request observes state changes
//! which happen while it is being executed.

mod dc_aware_round_robin;
mod host_distances;
pub mod host_distance_evaluator;
mod initializing_wrapper;
mod query_plan;
mod request;
mod round_robin;
mod token_aware;
mod white_list;

use std::sync::Arc;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::HostStateListener;
pub use crate::load_balancing::dc_aware_round_robin::DcAwareRoundRobinPolicy;
pub(crate) use crate::load_balancing::host_distances::HostDistances;
pub use crate::load_balancing::initializing_wrapper::InitializingWrapper;
pub use crate::load_balancing::query_plan::QueryPlan;
pub use crate::load_balancing::request::Request;
pub use crate::load_balancing::round_robin::RoundRobinPolicy;
pub use crate::load_balancing::token_aware::TokenAwarePolicy;
pub use crate::load_balancing::white_list::WhiteListPolicy;

/// Load balancing policy. A session owns exactly one instance, which also receives host state
/// notifications from the registry; distances are recomputed only in response to those.
pub trait LoadBalancingPolicy: HostStateListener {
    /// Called once, with all hosts known at session creation, before any other method.
    fn initialize(&self, hosts: &[Arc<Host>]);

    /// Returns the distance assigned to given host. Unknown hosts are `Ignored`.
    fn distance(&self, host: &Host) -> HostDistance;

    /// Returns a lazy query plan for given request. If no request is given, returns a generic plan
    /// for establishing connection(s) to host(s).
    fn new_query_plan(&self, request: Option<Request>) -> QueryPlan;
}

/// Checks if a host can be tried right now.
#[inline]
pub(crate) fn is_eligible(host: &Host, distance: HostDistance) -> bool {
    !host.is_down() && !distance.is_ignored()
}
