use derive_more::Display;

/// Determines how the driver will manage connections to a Cassandra node.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Display)]
pub enum HostDistance {
    /// An "active" distance that, indicates that the driver should maintain connections to the
    /// node; it also marks it as "preferred", meaning that the node gets the larger connection
    /// pool.
    Local,
    /// An "active" distance that, indicates that the driver should maintain connections to the
    /// node; it also marks it as "less preferred", meaning that it gets a single, smaller pool.
    Remote,
    /// The driver never connects to the node and never includes it in query plans.
    Ignored,
}

impl HostDistance {
    #[inline]
    pub fn is_ignored(self) -> bool {
        self == HostDistance::Ignored
    }
}
