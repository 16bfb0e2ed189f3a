use std::sync::{Arc, OnceLock};
use tracing::*;

use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::HostStateListener;
use crate::load_balancing::{LoadBalancingPolicy, QueryPlan, Request};

/// Wrapper policy which guarantees the inner policy is initialized exactly once, before it gets
/// asked about anything else. Until then, all hosts are `Ignored` and plans are empty.
pub struct InitializingWrapper<P: LoadBalancingPolicy> {
    inner: P,
    initialized: OnceLock<()>,
}

impl<P: LoadBalancingPolicy> InitializingWrapper<P> {
    pub fn new(inner: P) -> Self {
        InitializingWrapper {
            inner,
            initialized: OnceLock::new(),
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    #[inline]
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: LoadBalancingPolicy> HostStateListener for InitializingWrapper<P> {
    fn on_add(&self, host: &Arc<Host>) {
        if self.is_initialized() {
            self.inner.on_add(host);
        }
    }

    fn on_up(&self, host: &Arc<Host>) {
        if self.is_initialized() {
            self.inner.on_up(host);
        }
    }

    fn on_down(&self, host: &Arc<Host>) {
        if self.is_initialized() {
            self.inner.on_down(host);
        }
    }

    fn on_remove(&self, host: &Arc<Host>) {
        if self.is_initialized() {
            self.inner.on_remove(host);
        }
    }
}

impl<P: LoadBalancingPolicy> LoadBalancingPolicy for InitializingWrapper<P> {
    fn initialize(&self, hosts: &[Arc<Host>]) {
        let mut first = false;
        self.initialized.get_or_init(|| {
            first = true;
            self.inner.initialize(hosts);
        });

        if !first {
            debug!("Load balancing policy already initialized.");
        }
    }

    fn distance(&self, host: &Host) -> HostDistance {
        if self.is_initialized() {
            self.inner.distance(host)
        } else {
            HostDistance::Ignored
        }
    }

    fn new_query_plan(&self, request: Option<Request>) -> QueryPlan {
        if self.is_initialized() {
            self.inner.new_query_plan(request)
        } else {
            QueryPlan::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::cluster::topology::{Host, HostDistance, HostState};
    use crate::cluster::HostStateListener;
    use crate::load_balancing::{InitializingWrapper, LoadBalancingPolicy, QueryPlan, Request};

    #[derive(Default)]
    struct CountingPolicy {
        initialized: AtomicUsize,
        added: AtomicUsize,
    }

    impl HostStateListener for CountingPolicy {
        fn on_add(&self, _host: &Arc<Host>) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn on_up(&self, _host: &Arc<Host>) {}

        fn on_down(&self, _host: &Arc<Host>) {}
    }

    impl LoadBalancingPolicy for CountingPolicy {
        fn initialize(&self, _hosts: &[Arc<Host>]) {
            self.initialized.fetch_add(1, Ordering::SeqCst);
        }

        fn distance(&self, _host: &Host) -> HostDistance {
            HostDistance::Local
        }

        fn new_query_plan(&self, _request: Option<Request>) -> QueryPlan {
            QueryPlan::empty()
        }
    }

    #[test]
    fn should_initialize_once() {
        let host = Arc::new(Host::with_state(
            SocketAddr::new([127, 0, 0, 1].into(), 9042),
            "dc1",
            "r1",
            HostState::Up,
        ));

        let policy = InitializingWrapper::new(CountingPolicy::default());

        assert_eq!(policy.distance(&host), HostDistance::Ignored);
        policy.on_add(&host);
        assert_eq!(policy.inner().added.load(Ordering::SeqCst), 0);

        policy.initialize(&[host.clone()]);
        policy.initialize(&[host.clone()]);

        assert!(policy.is_initialized());
        assert_eq!(policy.inner().initialized.load(Ordering::SeqCst), 1);
        assert_eq!(policy.distance(&host), HostDistance::Local);

        policy.on_add(&host);
        assert_eq!(policy.inner().added.load(Ordering::SeqCst), 1);
    }
}
