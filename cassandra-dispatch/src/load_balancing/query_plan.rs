use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::cluster::topology::Host;

/// Finite, lazily evaluated sequence of hosts to try for a single request. A plan cannot be
/// restarted; each call to `next` observes the host state at that moment.
pub struct QueryPlan {
    hosts: Box<dyn Iterator<Item = Arc<Host>> + Send>,
}

impl QueryPlan {
    pub fn new<I>(hosts: I) -> Self
    where
        I: Iterator<Item = Arc<Host>> + Send + 'static,
    {
        QueryPlan {
            hosts: Box::new(hosts),
        }
    }

    #[inline]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl Iterator for QueryPlan {
    type Item = Arc<Host>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.hosts.next()
    }
}

impl Debug for QueryPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlan").finish_non_exhaustive()
    }
}
