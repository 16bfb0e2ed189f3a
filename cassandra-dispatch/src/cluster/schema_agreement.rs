use futures::future::join_all;
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::*;
use uuid::Uuid;

use crate::cluster::topology::Host;
use crate::cluster::{ConnectionManager, ConnectionPoolManager, HostRegistry};
use crate::error::{Error, Result};
use crate::frame::{RequestBody, ResponseBody};
use crate::transport::DispatchTransport;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often and how long to poll for schema agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchemaAgreementConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for SchemaAgreementConfig {
    fn default() -> Self {
        SchemaAgreementConfig {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Polls live hosts for their schema versions until they all report the same one.
pub struct SchemaAgreementWaiter<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>
{
    registry: Arc<HostRegistry>,
    pools: Arc<ConnectionPoolManager<T, CM>>,
    interval: Duration,
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>
    SchemaAgreementWaiter<T, CM>
{
    pub fn new(
        registry: Arc<HostRegistry>,
        pools: Arc<ConnectionPoolManager<T, CM>>,
        interval: Duration,
    ) -> Self {
        SchemaAgreementWaiter {
            registry,
            pools,
            interval,
        }
    }

    /// Waits until all live hosts agree on the schema version. Returns `false` if they don't
    /// converge within given timeout.
    pub async fn wait_for_agreement(&self, wait_timeout: Duration) -> bool {
        let poll = async {
            loop {
                if self.check_agreement().await {
                    return;
                }

                sleep(self.interval).await;
            }
        };

        let agreed = timeout(wait_timeout, poll).await.is_ok();
        if agreed {
            debug!("Schema agreement reached.");
        } else {
            warn!(timeout = ?wait_timeout, "Schema agreement not reached.");
        }

        agreed
    }

    /// Checks once if all live hosts report the same schema version. Hosts which fail to answer
    /// are skipped.
    pub async fn check_agreement(&self) -> bool {
        let hosts = self.registry.live_hosts();
        let versions: Vec<_> = join_all(hosts.iter().map(|host| self.fetch_version(host)))
            .await
            .into_iter()
            .zip(hosts.iter())
            .filter_map(|(version, host)| match version {
                Ok(version) => {
                    host.set_schema_version(version);
                    Some(version)
                }
                Err(error) => {
                    debug!(%error, address = %host.address(), "Failed to fetch schema version.");
                    None
                }
            })
            .collect();

        let distinct = versions.iter().unique().count();
        trace!(hosts = versions.len(), distinct, "Schema versions fetched.");

        distinct == 1
    }

    async fn fetch_version(&self, host: &Arc<Host>) -> Result<Uuid> {
        let connection = self.pools.acquire(host).await?;
        match connection.send(&RequestBody::SchemaVersion).await? {
            ResponseBody::SchemaVersion(version) => Ok(version),
            ResponseBody::Error(body) => Err(Error::Server {
                body,
                addr: host.address(),
            }),
            response => Err(Error::General(format!(
                "Unexpected schema version response: {response:?}"
            ))),
        }
    }
}
