use arc_swap::ArcSwap;
use derivative::Derivative;
use futures::future::Shared;
use futures::FutureExt;
use fxhash::FxHashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::*;

use crate::cluster::topology::Host;
use crate::cluster::{ConnectionManager, ConnectionPoolManager};
use crate::error::{Error, Result};
use crate::frame::message_request::BodyReqPrepare;
use crate::frame::message_result::ResResultBody;
use crate::frame::{RequestBody, ResponseBody};
use crate::future::SharedFuture;
use crate::transport::DispatchTransport;
use crate::types::PreparedId;

enum PrepareState {
    Ready(PreparedId),
    InFlight(SharedFuture<Result<PreparedId>>),
}

/// Statement prepared on one or more hosts. The query text (and optional keyspace) identify the
/// statement cluster-wide; the identifiers are tracked per host, since each host assigns its own.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PreparedStatement {
    query: String,
    keyspace: Option<String>,
    #[derivative(Debug = "ignore")]
    ids: Mutex<FxHashMap<SocketAddr, PrepareState>>,
}

impl PreparedStatement {
    fn new(query: String, keyspace: Option<String>) -> Self {
        PreparedStatement {
            query,
            keyspace,
            ids: Mutex::new(Default::default()),
        }
    }

    #[inline]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[inline]
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Returns the identifier given host assigned to this statement, if it's been prepared there.
    pub async fn id_for(&self, address: SocketAddr) -> Option<PreparedId> {
        match self.ids.lock().await.get(&address) {
            Some(PrepareState::Ready(id)) => Some(id.clone()),
            _ => None,
        }
    }
}

type StatementKey = (Option<String>, String);

/// Tracks prepared statements and their per-host identifiers.
///
/// Preparing the same statement on the same host is never done twice concurrently: callers which
/// find a prepare already in flight wait for its result instead of sending their own. Failed
/// prepares are not cached.
pub struct PreparedStatementCache<
    T: DispatchTransport + 'static,
    CM: ConnectionManager<T> + 'static,
> {
    pools: Arc<ConnectionPoolManager<T, CM>>,
    statements: ArcSwap<FxHashMap<StatementKey, Arc<PreparedStatement>>>,
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>
    PreparedStatementCache<T, CM>
{
    pub fn new(pools: Arc<ConnectionPoolManager<T, CM>>) -> Self {
        PreparedStatementCache {
            pools,
            statements: ArcSwap::from_pointee(Default::default()),
        }
    }

    /// Returns the statement handle for given text, creating it if needed. Handles are shared by
    /// everyone preparing the same text in the same keyspace.
    pub fn statement_for(&self, query: &str, keyspace: Option<&str>) -> Arc<PreparedStatement> {
        let key = (keyspace.map(str::to_string), query.to_string());
        if let Some(statement) = self.statements.load().get(&key) {
            return statement.clone();
        }

        let statement = Arc::new(PreparedStatement::new(key.1.clone(), key.0.clone()));
        let previous = self.statements.rcu(|statements| {
            if statements.contains_key(&key) {
                return Arc::clone(statements);
            }

            let mut statements = FxHashMap::clone(statements);
            statements.insert(key.clone(), statement.clone());
            Arc::new(statements)
        });

        previous.get(&key).cloned().unwrap_or(statement)
    }

    /// Number of distinct statements known.
    pub fn len(&self) -> usize {
        self.statements.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.load().is_empty()
    }

    /// Returns the identifier of given statement on given host, preparing it there first if
    /// needed. Concurrent callers for the same host share a single prepare.
    pub async fn ensure_prepared(
        &self,
        statement: &Arc<PreparedStatement>,
        host: &Arc<Host>,
    ) -> Result<PreparedId> {
        let address = host.address();

        let prepare = {
            let mut ids = statement.ids.lock().await;
            match ids.get(&address) {
                Some(PrepareState::Ready(id)) => return Ok(id.clone()),
                Some(PrepareState::InFlight(prepare)) => prepare.clone(),
                None => {
                    let prepare = Self::prepare_on_host(
                        self.pools.clone(),
                        statement.clone(),
                        host.clone(),
                    )
                    .boxed()
                    .shared();

                    ids.insert(address, PrepareState::InFlight(prepare.clone()));
                    prepare
                }
            }
        };

        let result = prepare.clone().await;

        let mut ids = statement.ids.lock().await;
        let is_current = matches!(
            ids.get(&address),
            Some(PrepareState::InFlight(current)) if Shared::ptr_eq(current, &prepare)
        );

        if is_current {
            match &result {
                Ok(id) => {
                    ids.insert(address, PrepareState::Ready(id.clone()));
                }
                Err(_) => {
                    ids.remove(&address);
                }
            }
        }

        result
    }

    /// Forgets the identifier a host has reported as unknown and prepares the statement there
    /// again. If someone else already replaced the stale identifier, the replacement is returned
    /// without preparing.
    pub async fn reprepare(
        &self,
        statement: &Arc<PreparedStatement>,
        host: &Arc<Host>,
        stale_id: &PreparedId,
    ) -> Result<PreparedId> {
        let address = host.address();

        {
            let mut ids = statement.ids.lock().await;
            if matches!(ids.get(&address), Some(PrepareState::Ready(id)) if id == stale_id) {
                ids.remove(&address);
            }
        }

        debug!(%address, query = statement.query(), "Re-preparing statement.");
        self.ensure_prepared(statement, host).await
    }

    async fn prepare_on_host(
        pools: Arc<ConnectionPoolManager<T, CM>>,
        statement: Arc<PreparedStatement>,
        host: Arc<Host>,
    ) -> Result<PreparedId> {
        let address = host.address();
        let connection = pools.acquire(&host).await?;

        let request = RequestBody::Prepare(BodyReqPrepare::new(
            statement.query.clone(),
            statement.keyspace.clone(),
        ));

        match connection.send(&request).await? {
            ResponseBody::Result(ResResultBody::Prepared(id)) => {
                debug!(%address, %id, query = statement.query(), "Statement prepared.");
                Ok(id)
            }
            ResponseBody::Error(body) => Err(Error::Server {
                body,
                addr: address,
            }),
            response => Err(Error::General(format!(
                "Unexpected response to prepare from {address}: {response:?}"
            ))),
        }
    }
}
