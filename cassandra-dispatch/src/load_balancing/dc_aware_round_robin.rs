use arc_swap::ArcSwap;
use fxhash::FxHashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::HostStateListener;
use crate::load_balancing::{
    is_eligible, HostDistances, LoadBalancingPolicy, QueryPlan, Request,
};

/// Datacenter-aware round-robin load balancing. Hosts from the local datacenter are `Local` and
/// always come first in plans. Up to `used_hosts_per_remote_dc` hosts from every other datacenter
/// are `Remote` and follow the local ones; the rest are `Ignored`.
///
/// Down hosts don't count towards the remote cap, so another host from the same datacenter takes
/// over their slot. A down host keeps the distance it had when it went down, which keeps it
/// eligible for reconnection.
pub struct DcAwareRoundRobinPolicy {
    local_dc: String,
    used_hosts_per_remote_dc: usize,
    hosts: ArcSwap<Vec<Arc<Host>>>,
    distances: Arc<HostDistances>,
    prev_idx: AtomicUsize,
}

impl DcAwareRoundRobinPolicy {
    pub fn new(local_dc: String, used_hosts_per_remote_dc: usize) -> Self {
        DcAwareRoundRobinPolicy {
            local_dc,
            used_hosts_per_remote_dc,
            hosts: ArcSwap::from_pointee(vec![]),
            distances: Default::default(),
            prev_idx: AtomicUsize::new(0),
        }
    }

    fn compute_distances(&self, hosts: &[Arc<Host>]) -> FxHashMap<SocketAddr, HostDistance> {
        let mut used_remote: FxHashMap<&str, usize> = Default::default();
        let mut distances = FxHashMap::default();

        for host in hosts {
            let distance = if host.datacenter() == self.local_dc {
                HostDistance::Local
            } else if host.is_down() {
                self.distances.get(host.address())
            } else {
                let used = used_remote.entry(host.datacenter()).or_default();
                if *used < self.used_hosts_per_remote_dc {
                    *used += 1;
                    HostDistance::Remote
                } else {
                    HostDistance::Ignored
                }
            };

            distances.insert(host.address(), distance);
        }

        distances
    }

    fn update_hosts(&self, f: impl Fn(&mut Vec<Arc<Host>>)) {
        self.hosts.rcu(|hosts| {
            let mut hosts = Vec::clone(hosts);
            f(&mut hosts);
            hosts
        });

        self.refresh_distances();
    }

    // remote caps depend on the whole membership and its liveness
    fn refresh_distances(&self) {
        self.distances
            .replace(self.compute_distances(&self.hosts.load()));
    }
}

impl HostStateListener for DcAwareRoundRobinPolicy {
    fn on_add(&self, host: &Arc<Host>) {
        self.update_hosts(|hosts| {
            if !hosts.iter().any(|known| known.address() == host.address()) {
                hosts.push(host.clone());
            }
        });
    }

    fn on_up(&self, _host: &Arc<Host>) {
        self.refresh_distances();
    }

    fn on_down(&self, _host: &Arc<Host>) {
        self.refresh_distances();
    }

    fn on_remove(&self, host: &Arc<Host>) {
        self.update_hosts(|hosts| hosts.retain(|known| known.address() != host.address()));
    }
}

impl LoadBalancingPolicy for DcAwareRoundRobinPolicy {
    fn initialize(&self, hosts: &[Arc<Host>]) {
        self.distances.replace(self.compute_distances(hosts));
        self.hosts.store(Arc::new(hosts.to_vec()));
    }

    #[inline]
    fn distance(&self, host: &Host) -> HostDistance {
        self.distances.get(host.address())
    }

    fn new_query_plan(&self, _request: Option<Request>) -> QueryPlan {
        let hosts = self.hosts.load();
        let (mut local, mut remote): (Vec<_>, Vec<_>) = hosts
            .iter()
            .filter(|host| !self.distances.get(host.address()).is_ignored())
            .cloned()
            .partition(|host| self.distances.get(host.address()) == HostDistance::Local);

        let cur_idx = self.prev_idx.fetch_add(1, Ordering::SeqCst);
        if !local.is_empty() {
            let len = local.len();
            local.rotate_left(cur_idx % len);
        }

        if !remote.is_empty() {
            let len = remote.len();
            remote.rotate_left(cur_idx % len);
        }

        let distances = self.distances.clone();
        QueryPlan::new(
            local
                .into_iter()
                .chain(remote)
                .filter(move |host| is_eligible(host, distances.get(host.address()))),
        )
    }
}
