use arc_swap::{ArcSwap, ArcSwapOption};
use fxhash::FxHashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::*;

use crate::cluster::connection_pool::{
    new_connection, ConnectionPool, ConnectionPoolConfig, PooledConnection,
};
use crate::cluster::topology::{Host, HostDistance};
use crate::cluster::{ConnectionManager, HostRegistry, HostStateListener};
use crate::error::{Error, Result};
use crate::load_balancing::LoadBalancingPolicy;
use crate::retry::{ReconnectionPolicy, ReconnectionSchedule};
use crate::transport::DispatchTransport;

struct HostPool<T: DispatchTransport> {
    pool: ArcSwapOption<ConnectionPool<T>>,
    init: Mutex<()>,
    reconnecting: AtomicBool,
}

impl<T: DispatchTransport> HostPool<T> {
    #[inline]
    fn try_start_reconnection(&self) -> bool {
        self.reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    fn finish_reconnection(&self) {
        self.reconnecting.store(false, Ordering::Release);
    }
}

impl<T: DispatchTransport> Default for HostPool<T> {
    fn default() -> Self {
        HostPool {
            pool: ArcSwapOption::empty(),
            init: Mutex::new(()),
            reconnecting: AtomicBool::new(false),
        }
    }
}

/// Owns one connection pool per host. Pools are created lazily on first use, sized by the
/// distance the load balancing policy assigns, and dropped when the host goes down, becomes
/// ignored or leaves the registry.
///
/// When a host goes down, a single reconnection loop is started for it. The loop reconnects to
/// the host according to the reconnection schedule and marks it up in the registry on first
/// success, which in turn recreates its pool.
pub struct ConnectionPoolManager<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>
{
    this: Weak<Self>,
    connection_manager: Arc<CM>,
    config: ConnectionPoolConfig,
    policy: Arc<dyn LoadBalancingPolicy>,
    reconnection_policy: Arc<dyn ReconnectionPolicy>,
    registry: Weak<HostRegistry>,
    pools: ArcSwap<FxHashMap<SocketAddr, Arc<HostPool<T>>>>,
    closed: AtomicBool,
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>
    ConnectionPoolManager<T, CM>
{
    pub fn new(
        connection_manager: Arc<CM>,
        config: ConnectionPoolConfig,
        policy: Arc<dyn LoadBalancingPolicy>,
        reconnection_policy: Arc<dyn ReconnectionPolicy>,
        registry: &Arc<HostRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| ConnectionPoolManager {
            this: this.clone(),
            connection_manager,
            config,
            policy,
            reconnection_policy,
            registry: Arc::downgrade(registry),
            pools: ArcSwap::from_pointee(Default::default()),
            closed: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn config(&self) -> &ConnectionPoolConfig {
        &self.config
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the current pool for given host, if one exists.
    pub fn pool(&self, address: SocketAddr) -> Option<Arc<ConnectionPool<T>>> {
        self.pools
            .load()
            .get(&address)
            .and_then(|slot| slot.pool.load_full())
    }

    /// Returns the pool for given host, creating it if needed. Concurrent callers for the same host
    /// wait for a single pool creation.
    pub async fn pool_for(&self, host: &Arc<Host>) -> Result<Arc<ConnectionPool<T>>> {
        let address = host.address();
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }

        if host.is_down() {
            return Err(Error::HostUnavailable { addr: address });
        }

        let distance = self.policy.distance(host);
        if distance.is_ignored() {
            self.drain(address);
            return Err(Error::HostUnavailable { addr: address });
        }

        let slot = self.slot(address);
        if let Some(pool) = Self::current_pool(&slot, distance) {
            return Ok(pool);
        }

        let _guard = slot.init.lock().await;
        if let Some(pool) = Self::current_pool(&slot, distance) {
            return Ok(pool);
        }

        if let Some(stale) = slot.pool.swap(None) {
            debug!(
                %address,
                from = ?stale.distance(),
                to = ?distance,
                "Replacing connection pool."
            );
            stale.close();
        }

        debug!(%address, ?distance, "Creating connection pool.");

        let pool = Arc::new(
            ConnectionPool::new(
                self.connection_manager.as_ref(),
                address,
                distance,
                &self.config,
            )
            .await?,
        );

        slot.pool.store(Some(pool.clone()));

        // a drain from close() or on_down() may have run before the store; the closed flag and
        // the host state are set before draining, so checking them afterwards catches it
        if self.is_closed() {
            self.drain(address);
            return Err(Error::SessionClosed);
        }

        if host.is_down() {
            self.drain(address);
            return Err(Error::HostUnavailable { addr: address });
        }

        Ok(pool)
    }

    /// Checks out a connection to given host.
    pub async fn acquire(&self, host: &Arc<Host>) -> Result<PooledConnection<T>> {
        self.pool_for(host).await?.acquire().await
    }

    /// Drops the pool of given host if it no longer matches its distance. A new pool is created on
    /// next use.
    pub fn on_distance_changed(&self, host: &Host, distance: HostDistance) {
        let address = host.address();
        if let Some(pool) = self.pool(address) {
            if pool.distance() != distance {
                debug!(%address, from = ?pool.distance(), to = ?distance, "Host distance changed.");
                self.drain(address);
            }
        }
    }

    /// Closes all pools and stops reconnection. Subsequent acquisitions fail with
    /// [`Error::SessionClosed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        for address in self.pools.load().keys() {
            self.drain(*address);
        }
    }

    fn current_pool(slot: &HostPool<T>, distance: HostDistance) -> Option<Arc<ConnectionPool<T>>> {
        slot.pool
            .load_full()
            .filter(|pool| pool.distance() == distance && !pool.is_closed())
    }

    fn slot(&self, address: SocketAddr) -> Arc<HostPool<T>> {
        if let Some(slot) = self.pools.load().get(&address) {
            return slot.clone();
        }

        let slot = Arc::new(HostPool::default());
        let previous = self.pools.rcu(|pools| {
            if pools.contains_key(&address) {
                return Arc::clone(pools);
            }

            let mut pools = FxHashMap::clone(pools);
            pools.insert(address, slot.clone());
            Arc::new(pools)
        });

        // another thread might have won the race
        previous.get(&address).cloned().unwrap_or(slot)
    }

    fn drain(&self, address: SocketAddr) {
        let pool = self
            .pools
            .load()
            .get(&address)
            .and_then(|slot| slot.pool.swap(None));

        if let Some(pool) = pool {
            debug!(%address, "Draining connection pool.");
            pool.close();
        }
    }

    fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(future);
                true
            }
            Err(_) => {
                warn!("No async runtime available. Background task not started.");
                false
            }
        }
    }

    fn start_reconnection(&self, host: Arc<Host>) {
        let address = host.address();
        let slot = self.slot(address);
        if !slot.try_start_reconnection() {
            return;
        }

        warn!(%address, "Host down. Starting reconnection.");

        let schedule = self.reconnection_policy.new_host_schedule();
        let manager = self.this.clone();
        let started = self.spawn({
            let slot = slot.clone();
            async move {
                let reconnected = Self::run_reconnection_loop(manager, slot, host, schedule).await;
                debug!(%address, reconnected, "Reconnection loop finished.");
            }
        });

        if !started {
            slot.finish_reconnection();
        }
    }

    /// Reconnects to a down host until it comes back, the schedule gives up, the host leaves the
    /// registry or the manager closes. The loop owns the slot's `reconnecting` flag and releases it
    /// on every exit, before the host is marked up, so a later `on_down` can always start a new
    /// loop.
    async fn run_reconnection_loop(
        manager: Weak<Self>,
        slot: Arc<HostPool<T>>,
        host: Arc<Host>,
        mut schedule: ReconnectionSchedule,
    ) -> bool {
        let address = host.address();

        loop {
            let delay = match schedule.next() {
                Some(delay) => delay,
                None => {
                    warn!(%address, "Reconnection schedule exhausted. Host stays down.");
                    break;
                }
            };

            sleep(delay).await;

            let (manager, registry) = match manager.upgrade() {
                Some(manager) if !manager.is_closed() => match manager.registry.upgrade() {
                    Some(registry) => (manager, registry),
                    None => break,
                },
                _ => break,
            };

            let registered = registry
                .get(address)
                .map_or(false, |current| Arc::ptr_eq(&current, &host));
            if !registered {
                debug!(%address, "Host left the registry. Stopping reconnection.");
                slot.finish_reconnection();
                return false;
            }

            if !host.is_down() {
                // something else brought the host back
                slot.finish_reconnection();
                if host.is_down() && slot.try_start_reconnection() {
                    // and it went down again before the flag was released
                    continue;
                }

                return true;
            }

            match new_connection(
                manager.connection_manager.as_ref(),
                address,
                manager.config.connect_timeout(),
            )
            .await
            {
                Ok(_) => {
                    info!(%address, "Reconnected to host.");
                    slot.finish_reconnection();
                    registry.mark_up(address);
                    return true;
                }
                Err(error) => {
                    debug!(%error, %address, "Reconnection attempt failed.");
                }
            }
        }

        slot.finish_reconnection();
        false
    }

    fn warm_up(&self, host: &Arc<Host>) {
        if let Some(manager) = self.this.upgrade() {
            let host = host.clone();
            self.spawn(async move {
                if let Err(error) = manager.pool_for(&host).await {
                    debug!(%error, address = %host.address(), "Failed to create connection pool.");
                }
            });
        }
    }
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> HostStateListener
    for ConnectionPoolManager<T, CM>
{
    fn on_add(&self, host: &Arc<Host>) {
        self.on_distance_changed(host, self.policy.distance(host));
    }

    fn on_up(&self, host: &Arc<Host>) {
        if self.is_closed() {
            return;
        }

        let distance = self.policy.distance(host);
        self.on_distance_changed(host, distance);

        if !distance.is_ignored() && self.pool(host.address()).is_none() {
            self.warm_up(host);
        }
    }

    fn on_down(&self, host: &Arc<Host>) {
        self.drain(host.address());

        if !self.is_closed() && !self.policy.distance(host).is_ignored() {
            self.start_reconnection(host.clone());
        }
    }

    fn on_remove(&self, host: &Arc<Host>) {
        let address = host.address();
        self.drain(address);
        self.pools.rcu(|pools| {
            let mut pools = FxHashMap::clone(pools);
            pools.remove(&address);
            pools
        });
    }
}
