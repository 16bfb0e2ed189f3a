use fxhash::FxHashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::HostStateListener;
use crate::load_balancing::{LoadBalancingPolicy, QueryPlan, Request};

/// Restricts a child policy to an allow-list of host addresses. Hosts outside the list are
/// `Ignored` and the child policy never learns about them.
pub struct WhiteListPolicy<P: LoadBalancingPolicy> {
    child: P,
    allowed: Arc<FxHashSet<SocketAddr>>,
}

impl<P: LoadBalancingPolicy> WhiteListPolicy<P> {
    pub fn new(child: P, allowed: impl IntoIterator<Item = SocketAddr>) -> Self {
        WhiteListPolicy {
            child,
            allowed: Arc::new(allowed.into_iter().collect()),
        }
    }

    #[inline]
    fn is_allowed(&self, host: &Host) -> bool {
        self.allowed.contains(&host.address())
    }
}

impl<P: LoadBalancingPolicy> HostStateListener for WhiteListPolicy<P> {
    fn on_add(&self, host: &Arc<Host>) {
        if self.is_allowed(host) {
            self.child.on_add(host);
        }
    }

    fn on_up(&self, host: &Arc<Host>) {
        if self.is_allowed(host) {
            self.child.on_up(host);
        }
    }

    fn on_down(&self, host: &Arc<Host>) {
        if self.is_allowed(host) {
            self.child.on_down(host);
        }
    }

    fn on_remove(&self, host: &Arc<Host>) {
        if self.is_allowed(host) {
            self.child.on_remove(host);
        }
    }
}

impl<P: LoadBalancingPolicy> LoadBalancingPolicy for WhiteListPolicy<P> {
    fn initialize(&self, hosts: &[Arc<Host>]) {
        let hosts: Vec<_> = hosts
            .iter()
            .filter(|host| self.is_allowed(host))
            .cloned()
            .collect();

        self.child.initialize(&hosts);
    }

    fn distance(&self, host: &Host) -> HostDistance {
        if self.is_allowed(host) {
            self.child.distance(host)
        } else {
            HostDistance::Ignored
        }
    }

    fn new_query_plan(&self, request: Option<Request>) -> QueryPlan {
        let allowed = self.allowed.clone();
        QueryPlan::new(
            self.child
                .new_query_plan(request)
                .filter(move |host| allowed.contains(&host.address())),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use crate::cluster::topology::{Host, HostDistance, HostState};
    use crate::cluster::HostStateListener;
    use crate::load_balancing::{LoadBalancingPolicy, RoundRobinPolicy, WhiteListPolicy};

    #[test]
    fn should_ignore_hosts_outside_list() {
        let hosts: Vec<_> = (1..=3)
            .map(|index| {
                Arc::new(Host::with_state(
                    SocketAddr::new([127, 0, 0, index].into(), 9042),
                    "dc1",
                    "r1",
                    HostState::Up,
                ))
            })
            .collect();

        let policy = WhiteListPolicy::new(
            RoundRobinPolicy::new(),
            vec![hosts[0].address(), hosts[2].address()],
        );
        policy.initialize(&hosts);

        assert_eq!(policy.distance(&hosts[1]), HostDistance::Ignored);
        assert_eq!(policy.distance(&hosts[2]), HostDistance::Local);

        for _ in 0..3 {
            let plan: Vec<_> = policy
                .new_query_plan(None)
                .map(|host| host.address())
                .collect();
            assert_eq!(plan.len(), 2);
            assert!(!plan.contains(&hosts[1].address()));
        }

        let extra = Arc::new(Host::with_state(
            "127.0.0.9:9042".parse().unwrap(),
            "dc1",
            "r1",
            HostState::Up,
        ));
        policy.on_add(&extra);
        assert_eq!(policy.distance(&extra), HostDistance::Ignored);
    }
}
