use arc_swap::ArcSwap;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::{HostStateListener, TokenMap};
use crate::load_balancing::{is_eligible, LoadBalancingPolicy, QueryPlan, Request};

/// Token-aware load balancing. If a request carries a routing key and the [`TokenMap`] resolves
/// its replicas, those replicas are yielded first, in the order given by the token map. The
/// remaining hosts follow in the order produced by the child policy, without duplicates.
/// Distances are always delegated to the child policy.
pub struct TokenAwarePolicy<P: LoadBalancingPolicy + 'static, M: TokenMap> {
    child: Arc<P>,
    token_map: M,
    hosts: ArcSwap<FxHashMap<SocketAddr, Arc<Host>>>,
}

impl<P: LoadBalancingPolicy + 'static, M: TokenMap> TokenAwarePolicy<P, M> {
    pub fn new(child: P, token_map: M) -> Self {
        TokenAwarePolicy {
            child: Arc::new(child),
            token_map,
            hosts: Default::default(),
        }
    }

    fn replicas(&self, request: Option<Request>) -> Vec<Arc<Host>> {
        let replicas = match request {
            Some(Request {
                keyspace,
                routing_key: Some(routing_key),
                ..
            }) => self.token_map.replicas(keyspace, routing_key),
            _ => return vec![],
        };

        let hosts = self.hosts.load();
        replicas
            .into_iter()
            .unique()
            .filter_map(|address| hosts.get(&address).cloned())
            .collect()
    }
}

impl<P: LoadBalancingPolicy + 'static, M: TokenMap> HostStateListener for TokenAwarePolicy<P, M> {
    fn on_add(&self, host: &Arc<Host>) {
        self.hosts.rcu(|hosts| {
            let mut hosts = FxHashMap::clone(hosts);
            hosts.entry(host.address()).or_insert_with(|| host.clone());
            hosts
        });

        self.child.on_add(host);
    }

    fn on_up(&self, host: &Arc<Host>) {
        self.child.on_up(host);
    }

    fn on_down(&self, host: &Arc<Host>) {
        self.child.on_down(host);
    }

    fn on_remove(&self, host: &Arc<Host>) {
        self.hosts.rcu(|hosts| {
            let mut hosts = FxHashMap::clone(hosts);
            hosts.remove(&host.address());
            hosts
        });

        self.child.on_remove(host);
    }
}

impl<P: LoadBalancingPolicy + 'static, M: TokenMap> LoadBalancingPolicy
    for TokenAwarePolicy<P, M>
{
    fn initialize(&self, hosts: &[Arc<Host>]) {
        self.hosts.store(Arc::new(
            hosts
                .iter()
                .map(|host| (host.address(), host.clone()))
                .collect(),
        ));

        self.child.initialize(hosts);
    }

    #[inline]
    fn distance(&self, host: &Host) -> HostDistance {
        self.child.distance(host)
    }

    fn new_query_plan(&self, request: Option<Request>) -> QueryPlan {
        let replicas = self.replicas(request);
        let child_plan = self.child.new_query_plan(request);

        if replicas.is_empty() {
            return child_plan;
        }

        let replica_addresses: FxHashSet<SocketAddr> =
            replicas.iter().map(|host| host.address()).collect();
        let child = self.child.clone();

        QueryPlan::new(
            replicas
                .into_iter()
                .filter(move |host| is_eligible(host, child.distance(host)))
                .chain(child_plan.filter(move |host| !replica_addresses.contains(&host.address()))),
        )
    }
}

//noinspection DuplicatedCode
#[cfg(test)]
mod tests {
    use lazy_static::lazy_static;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cluster::topology::{Host, HostState};
    use crate::cluster::TokenMap;
    use crate::load_balancing::{LoadBalancingPolicy, Request, RoundRobinPolicy, TokenAwarePolicy};
    use crate::types::RoutingKey;

    lazy_static! {
        static ref ROUTING_KEY: RoutingKey = RoutingKey::from(&b"partition"[..]);
    }

    #[derive(Default)]
    struct StaticTokenMap {
        replicas: Vec<SocketAddr>,
        lookups: AtomicUsize,
    }

    impl TokenMap for StaticTokenMap {
        fn replicas(&self, _keyspace: Option<&str>, routing_key: &RoutingKey) -> Vec<SocketAddr> {
            assert_eq!(routing_key, &*ROUTING_KEY);
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.replicas.clone()
        }
    }

    fn create_hosts(count: u8) -> Vec<Arc<Host>> {
        (1..=count)
            .map(|index| {
                Arc::new(Host::with_state(
                    SocketAddr::new([127, 0, 0, index].into(), 9042),
                    "dc1",
                    "r1",
                    HostState::Up,
                ))
            })
            .collect()
    }

    fn create_policy(
        hosts: &[Arc<Host>],
        replicas: Vec<SocketAddr>,
    ) -> TokenAwarePolicy<RoundRobinPolicy, StaticTokenMap> {
        let token_map = StaticTokenMap {
            replicas,
            ..Default::default()
        };

        let policy = TokenAwarePolicy::new(RoundRobinPolicy::new(), token_map);
        policy.initialize(hosts);
        policy
    }

    fn request(keyspace: Option<&str>) -> Request {
        Request::new(keyspace, Some(&*ROUTING_KEY), None)
    }

    #[test]
    fn should_yield_replicas_first_in_order() {
        let hosts = create_hosts(5);
        let replicas = vec![hosts[3].address(), hosts[0].address(), hosts[2].address()];
        let policy = create_policy(&hosts, replicas.clone());

        for _ in 0..5 {
            let plan: Vec<_> = policy
                .new_query_plan(Some(request(Some("ks"))))
                .map(|host| host.address())
                .collect();

            assert_eq!(plan.len(), 5);
            assert_eq!(plan[..3], replicas[..]);
            assert!(plan[3..].contains(&hosts[1].address()));
            assert!(plan[3..].contains(&hosts[4].address()));
        }
    }

    #[test]
    fn should_skip_down_replicas() {
        let hosts = create_hosts(4);
        let policy = create_policy(&hosts, vec![hosts[1].address(), hosts[2].address()]);

        hosts[1].swap_state(HostState::Down);

        let plan: Vec<_> = policy
            .new_query_plan(Some(request(None)))
            .map(|host| host.address())
            .collect();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], hosts[2].address());
        assert!(!plan.contains(&hosts[1].address()));
    }

    #[test]
    fn should_fall_back_without_routing_key() {
        let hosts = create_hosts(3);
        let policy = create_policy(&hosts, vec![hosts[2].address()]);

        let plan: Vec<_> = policy
            .new_query_plan(Some(Request::new(Some("ks"), None, None)))
            .collect();
        assert_eq!(plan.len(), 3);
        assert_eq!(policy.token_map.lookups.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn should_fall_back_for_unresolved_replicas() {
        let hosts = create_hosts(3);
        let unknown: SocketAddr = "10.0.0.1:9042".parse().unwrap();
        let policy = create_policy(&hosts, vec![unknown]);

        let plan: Vec<_> = policy
            .new_query_plan(Some(request(Some("ks"))))
            .map(|host| host.address())
            .collect();

        assert_eq!(plan.len(), 3);
        assert!(!plan.contains(&unknown));
    }

    #[test]
    fn should_not_duplicate_replicas() {
        let hosts = create_hosts(3);
        let policy = create_policy(
            &hosts,
            vec![hosts[2].address(), hosts[2].address(), hosts[0].address()],
        );

        let plan: Vec<_> = policy
            .new_query_plan(Some(request(Some("ks"))))
            .map(|host| host.address())
            .collect();

        assert_eq!(
            plan,
            vec![hosts[2].address(), hosts[0].address(), hosts[1].address()]
        );
    }
}
