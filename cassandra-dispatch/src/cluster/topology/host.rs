use arc_swap::ArcSwapOption;
use atomic::Atomic;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

use crate::cluster::topology::HostState;

/// Metadata about a Cassandra node in the cluster. Hosts are owned by the
/// [`HostRegistry`](crate::cluster::HostRegistry); everything else holds shared references.
pub struct Host {
    address: SocketAddr,
    datacenter: String,
    rack: String,
    host_id: Option<Uuid>,
    state: Atomic<HostState>,
    schema_version: ArcSwapOption<Uuid>,
}

impl Debug for Host {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("address", &self.address)
            .field("datacenter", &self.datacenter)
            .field("rack", &self.rack)
            .field("host_id", &self.host_id)
            .field("state", &self.state())
            .field("schema_version", &self.schema_version())
            .finish()
    }
}

impl Host {
    pub fn new(
        address: SocketAddr,
        datacenter: impl Into<String>,
        rack: impl Into<String>,
    ) -> Self {
        Self::with_state(address, datacenter, rack, HostState::Unknown)
    }

    pub fn with_state(
        address: SocketAddr,
        datacenter: impl Into<String>,
        rack: impl Into<String>,
        state: HostState,
    ) -> Self {
        Host {
            address,
            datacenter: datacenter.into(),
            rack: rack.into(),
            host_id: None,
            state: Atomic::new(state),
            schema_version: ArcSwapOption::empty(),
        }
    }

    /// Sets the id assigned to this node by Cassandra.
    #[must_use]
    pub fn with_host_id(mut self, host_id: Uuid) -> Self {
        self.host_id = Some(host_id);
        self
    }

    /// The address the driver connects to.
    #[inline]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the dc the host is in.
    #[inline]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Returns the rack the host is in.
    #[inline]
    pub fn rack(&self) -> &str {
        &self.rack
    }

    /// The host ID that is assigned to this node by Cassandra. This value can be used to uniquely
    /// identify a node even when the underling IP address changes.
    #[inline]
    pub fn host_id(&self) -> Option<Uuid> {
        self.host_id
    }

    #[inline]
    pub fn state(&self) -> HostState {
        self.state.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.state() == HostState::Up
    }

    #[inline]
    pub fn is_down(&self) -> bool {
        self.state() == HostState::Down
    }

    /// Last schema version reported by this host, if it was ever asked.
    pub fn schema_version(&self) -> Option<Uuid> {
        self.schema_version.load().as_deref().copied()
    }

    pub(crate) fn set_schema_version(&self, version: Uuid) {
        self.schema_version.store(Some(Arc::new(version)));
    }

    /// Stores new state and returns the previous one.
    pub(crate) fn swap_state(&self, state: HostState) -> HostState {
        self.state.swap(state, Ordering::AcqRel)
    }
}
