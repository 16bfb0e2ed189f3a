use arc_swap::ArcSwap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::*;

use crate::cluster::host_listener::HostStateListener;
use crate::cluster::topology::{Host, HostState};

/// Authoritative state of every known host. Reads are lock-free snapshots; writes replace the
/// host list atomically.
pub struct HostRegistry {
    hosts: ArcSwap<Vec<Arc<Host>>>,
    listeners: ArcSwap<Vec<Arc<dyn HostStateListener>>>,
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry {
            hosts: ArcSwap::from_pointee(vec![]),
            listeners: ArcSwap::from_pointee(vec![]),
        }
    }

    /// Adds a host, notifying listeners. Registering an address which is already known returns the
    /// existing host and does nothing else.
    pub fn register(&self, host: Host) -> Arc<Host> {
        let host = Arc::new(host);
        let address = host.address();

        let previous = self.hosts.rcu(|hosts| {
            if hosts.iter().any(|existing| existing.address() == address) {
                return Arc::clone(hosts);
            }

            let mut hosts = Vec::clone(hosts);
            hosts.push(host.clone());
            Arc::new(hosts)
        });

        if let Some(existing) = previous
            .iter()
            .find(|existing| existing.address() == address)
        {
            return existing.clone();
        }

        debug!(%address, datacenter = host.datacenter(), "Host registered.");
        self.notify(|listener| listener.on_add(&host));

        host
    }

    /// Removes a host, notifying listeners.
    pub fn unregister(&self, address: SocketAddr) -> Option<Arc<Host>> {
        let previous = self.hosts.rcu(|hosts| {
            let mut hosts = Vec::clone(hosts);
            hosts.retain(|host| host.address() != address);
            hosts
        });

        let removed = previous
            .iter()
            .find(|host| host.address() == address)
            .cloned()?;

        debug!(%address, "Host removed.");
        self.notify(|listener| listener.on_remove(&removed));

        Some(removed)
    }

    /// Marks given host as up. Returns `true` if the state actually changed.
    pub fn mark_up(&self, address: SocketAddr) -> bool {
        self.transition(address, HostState::Up)
    }

    /// Marks given host as down. Returns `true` if the state actually changed; marking an already
    /// down host is a no-op.
    pub fn mark_down(&self, address: SocketAddr) -> bool {
        self.transition(address, HostState::Down)
    }

    /// Adds a listener which will receive all subsequent state changes.
    pub fn subscribe(&self, listener: Arc<dyn HostStateListener>) {
        self.listeners.rcu(|listeners| {
            let mut listeners = Vec::clone(listeners);
            listeners.push(listener.clone());
            listeners
        });
    }

    /// Returns the host with given address, if known.
    pub fn get(&self, address: SocketAddr) -> Option<Arc<Host>> {
        self.hosts
            .load()
            .iter()
            .find(|host| host.address() == address)
            .cloned()
    }

    /// Snapshot of all known hosts, in registration order.
    #[inline]
    pub fn hosts(&self) -> Arc<Vec<Arc<Host>>> {
        self.hosts.load_full()
    }

    /// Hosts currently known to be up.
    pub fn live_hosts(&self) -> Vec<Arc<Host>> {
        self.hosts
            .load()
            .iter()
            .filter(|host| host.is_up())
            .cloned()
            .collect()
    }

    fn transition(&self, address: SocketAddr, state: HostState) -> bool {
        let host = match self.get(address) {
            Some(host) => host,
            None => {
                warn!(%address, %state, "State change for unknown host.");
                return false;
            }
        };

        // the swap makes concurrent identical transitions collapse onto exactly one notification
        let previous = host.swap_state(state);
        if previous == state {
            return false;
        }

        match state {
            HostState::Up => {
                info!(%address, %previous, "Host is up.");
                self.notify(|listener| listener.on_up(&host));
            }
            HostState::Down => {
                warn!(%address, %previous, "Host is down.");
                self.notify(|listener| listener.on_down(&host));
            }
            HostState::Unknown => {}
        }

        true
    }

    fn notify(&self, f: impl Fn(&dyn HostStateListener)) {
        for listener in self.listeners.load().iter() {
            f(listener.as_ref());
        }
    }
}
