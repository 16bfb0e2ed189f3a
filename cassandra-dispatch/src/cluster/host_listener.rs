#[cfg(test)]
use mockall::automock;
use std::sync::Arc;

use crate::cluster::topology::Host;

/// Receives host state transitions from the [`HostRegistry`](crate::cluster::HostRegistry).
///
/// Notifications are delivered synchronously, on the task which caused the transition, in
/// subscription order. They are not ordered relative to query plans being iterated at the same
/// time, so plan consumers must treat host state as eventually consistent.
#[cfg_attr(test, automock)]
pub trait HostStateListener: Send + Sync {
    /// A new host joined the registry.
    fn on_add(&self, _host: &Arc<Host>) {}

    /// A host transitioned to `Up`.
    fn on_up(&self, host: &Arc<Host>);

    /// A host transitioned to `Down`.
    fn on_down(&self, host: &Arc<Host>);

    /// A host left the registry.
    fn on_remove(&self, _host: &Arc<Host>) {}
}
