use arc_swap::ArcSwap;
use fxhash::FxHashMap;
use std::net::SocketAddr;

use crate::cluster::topology::HostDistance;

/// Distances assigned by a policy, readable without locking from plans which outlive the call that
/// created them.
#[derive(Default, Debug)]
pub(crate) struct HostDistances {
    distances: ArcSwap<FxHashMap<SocketAddr, HostDistance>>,
}

impl HostDistances {
    #[inline]
    pub fn get(&self, address: SocketAddr) -> HostDistance {
        self.distances
            .load()
            .get(&address)
            .copied()
            .unwrap_or(HostDistance::Ignored)
    }

    pub fn set(&self, address: SocketAddr, distance: HostDistance) {
        self.distances.rcu(|distances| {
            let mut distances = FxHashMap::clone(distances);
            distances.insert(address, distance);
            distances
        });
    }

    pub fn remove(&self, address: SocketAddr) {
        self.distances.rcu(|distances| {
            let mut distances = FxHashMap::clone(distances);
            distances.remove(&address);
            distances
        });
    }

    pub fn replace(&self, distances: FxHashMap<SocketAddr, HostDistance>) {
        self.distances.store(distances.into());
    }
}
