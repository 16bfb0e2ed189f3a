#[cfg(test)]
use mockall::*;

use crate::cluster::topology::{Host, HostDistance};

/// A host distance evaluator evaluates given host distance in relation to the driver.
#[cfg_attr(test, automock)]
pub trait HostDistanceEvaluator: Send + Sync {
    /// Computes a distance to a given host. Hosts evaluated as `Ignored` never get connections and
    /// never appear in query plans.
    fn compute_distance(&self, host: &Host) -> HostDistance;
}

/// A simple evaluator which treats all hosts as local.
#[derive(Default, Debug, Clone, Copy)]
pub struct AllLocalHostDistanceEvaluator;

impl HostDistanceEvaluator for AllLocalHostDistanceEvaluator {
    fn compute_distance(&self, _host: &Host) -> HostDistance {
        HostDistance::Local
    }
}

/// An evaluator which is aware of host location in relation to local DC.
#[derive(Debug, Clone)]
pub struct TopologyAwareHostDistanceEvaluator {
    local_dc: String,
}

impl HostDistanceEvaluator for TopologyAwareHostDistanceEvaluator {
    fn compute_distance(&self, host: &Host) -> HostDistance {
        if host.datacenter() == self.local_dc {
            HostDistance::Local
        } else {
            HostDistance::Remote
        }
    }
}

impl TopologyAwareHostDistanceEvaluator {
    /// Local DC name represents the datacenter local to where the driver is running.
    pub fn new(local_dc: String) -> Self {
        TopologyAwareHostDistanceEvaluator { local_dc }
    }
}

//noinspection DuplicatedCode
#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use crate::cluster::topology::{Host, HostDistance};
    use crate::load_balancing::host_distance_evaluator::{
        HostDistanceEvaluator, TopologyAwareHostDistanceEvaluator,
    };

    #[test]
    fn should_return_topology_aware_distance() {
        let local_dc = "test";
        let evaluator = TopologyAwareHostDistanceEvaluator::new(local_dc.into());
        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        assert_eq!(
            evaluator.compute_distance(&Host::new(address, "", "")),
            HostDistance::Remote
        );
        assert_eq!(
            evaluator.compute_distance(&Host::new(address, local_dc, "")),
            HostDistance::Local
        );
    }
}
