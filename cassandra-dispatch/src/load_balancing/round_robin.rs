use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::HostStateListener;
use crate::load_balancing::host_distance_evaluator::{
    AllLocalHostDistanceEvaluator, HostDistanceEvaluator,
};
use crate::load_balancing::{
    is_eligible, HostDistances, LoadBalancingPolicy, QueryPlan, Request,
};

/// Simple round-robin load balancing. Each plan starts one host further than the previous one and
/// contains all eligible hosts, regardless of routing key.
pub struct RoundRobinPolicy<E: HostDistanceEvaluator = AllLocalHostDistanceEvaluator> {
    hosts: ArcSwap<Vec<Arc<Host>>>,
    distances: Arc<HostDistances>,
    evaluator: E,
    prev_idx: AtomicUsize,
}

impl Default for RoundRobinPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundRobinPolicy {
    pub fn new() -> Self {
        Self::with_evaluator(AllLocalHostDistanceEvaluator)
    }
}

impl<E: HostDistanceEvaluator> RoundRobinPolicy<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        RoundRobinPolicy {
            hosts: ArcSwap::from_pointee(vec![]),
            distances: Default::default(),
            evaluator,
            prev_idx: AtomicUsize::new(0),
        }
    }
}

impl<E: HostDistanceEvaluator> HostStateListener for RoundRobinPolicy<E> {
    fn on_add(&self, host: &Arc<Host>) {
        self.hosts.rcu(|hosts| {
            let mut hosts = Vec::clone(hosts);
            if !hosts.iter().any(|known| known.address() == host.address()) {
                hosts.push(host.clone());
            }

            hosts
        });

        self.distances
            .set(host.address(), self.evaluator.compute_distance(host));
    }

    fn on_up(&self, host: &Arc<Host>) {
        self.distances
            .set(host.address(), self.evaluator.compute_distance(host));
    }

    fn on_down(&self, _host: &Arc<Host>) {}

    fn on_remove(&self, host: &Arc<Host>) {
        self.hosts.rcu(|hosts| {
            let mut hosts = Vec::clone(hosts);
            hosts.retain(|known| known.address() != host.address());
            hosts
        });

        self.distances.remove(host.address());
    }
}

impl<E: HostDistanceEvaluator> LoadBalancingPolicy for RoundRobinPolicy<E> {
    fn initialize(&self, hosts: &[Arc<Host>]) {
        self.distances.replace(
            hosts
                .iter()
                .map(|host| (host.address(), self.evaluator.compute_distance(host)))
                .collect(),
        );
        self.hosts.store(Arc::new(hosts.to_vec()));
    }

    #[inline]
    fn distance(&self, host: &Host) -> HostDistance {
        self.distances.get(host.address())
    }

    fn new_query_plan(&self, _request: Option<Request>) -> QueryPlan {
        let hosts = self.hosts.load_full();
        if hosts.is_empty() {
            return QueryPlan::empty();
        }

        let len = hosts.len();
        let cur_idx = self.prev_idx.fetch_add(1, Ordering::SeqCst) % len;
        let distances = self.distances.clone();

        QueryPlan::new(
            (0..len)
                .map(move |offset| hosts[(cur_idx + offset) % len].clone())
                .filter(move |host| is_eligible(host, distances.get(host.address()))),
        )
    }
}
