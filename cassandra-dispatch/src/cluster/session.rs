use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::*;

use crate::cluster::topology::Host;
use crate::cluster::{
    ConnectionManager, ConnectionPoolConfig, ConnectionPoolManager, HostRegistry, PreparedStatement,
    PreparedStatementCache, QueryExecutor, QueryResponse, SchemaAgreementConfig,
    SchemaAgreementWaiter,
};
use crate::consistency::Consistency;
use crate::error::{Error, Result};
use crate::frame::message_result::ResResultBody;
use crate::load_balancing::{InitializingWrapper, LoadBalancingPolicy};
use crate::retry::{
    DefaultRetryPolicy, ExponentialReconnectionPolicy, ReconnectionPolicy, RetryPolicy,
};
use crate::statement::StatementParams;
use crate::transport::DispatchTransport;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(12);

/// Result of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub body: ResResultBody,
    /// Host which executed the request.
    pub coordinator: SocketAddr,
    /// For schema-altering requests, tells if all live hosts agreed on the new schema before the
    /// result was returned. `None` for all other requests.
    pub schema_in_agreement: Option<bool>,
}

/// Long-lived entry point to the cluster. Owns the host registry, the load balancing policy,
/// connection pools and prepared statements. Everything is released on [`Session::close`] or
/// when the session is dropped.
pub struct Session<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> {
    registry: Arc<HostRegistry>,
    pools: Arc<ConnectionPoolManager<T, CM>>,
    prepared: Arc<PreparedStatementCache<T, CM>>,
    executor: QueryExecutor<T, CM>,
    schema_agreement: SchemaAgreementWaiter<T, CM>,
    schema_agreement_timeout: Duration,
    default_consistency: Consistency,
    closed: AtomicBool,
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> Session<T, CM> {
    /// Executes given query with default parameters.
    pub async fn query(&self, query: impl AsRef<str>) -> Result<QueryResult> {
        self.query_with_params(query, StatementParams::default())
            .await
    }

    /// Executes given query.
    pub async fn query_with_params(
        &self,
        query: impl AsRef<str>,
        params: StatementParams,
    ) -> Result<QueryResult> {
        self.check_open()?;

        let consistency = params.consistency.unwrap_or(self.default_consistency);
        let response = self
            .executor
            .query(query.as_ref(), &params, consistency)
            .await?;

        self.complete(response).await
    }

    /// Prepares a statement on the first host able to do so. Other hosts prepare it on demand.
    pub async fn prepare(&self, query: impl AsRef<str>) -> Result<Arc<PreparedStatement>> {
        self.prepare_with_keyspace(query, None).await
    }

    /// Prepares a statement in given keyspace.
    pub async fn prepare_with_keyspace(
        &self,
        query: impl AsRef<str>,
        keyspace: Option<&str>,
    ) -> Result<Arc<PreparedStatement>> {
        self.check_open()?;

        let statement = self.prepared.statement_for(query.as_ref(), keyspace);
        let response = self.executor.prepare(&statement).await?;

        debug!(
            coordinator = %response.coordinator,
            query = statement.query(),
            "Statement prepared."
        );

        Ok(statement)
    }

    /// Executes a prepared statement.
    pub async fn execute(
        &self,
        statement: &Arc<PreparedStatement>,
        params: StatementParams,
    ) -> Result<QueryResult> {
        self.check_open()?;

        let consistency = params.consistency.unwrap_or(self.default_consistency);
        let response = self
            .executor
            .execute(statement, &params, consistency)
            .await?;

        self.complete(response).await
    }

    /// Waits for live hosts to agree on the schema version, up to the configured timeout.
    pub async fn wait_for_schema_agreement(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self
            .schema_agreement
            .wait_for_agreement(self.schema_agreement_timeout)
            .await)
    }

    /// Checks once if live hosts agree on the schema version.
    pub async fn check_schema_agreement(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.schema_agreement.check_agreement().await)
    }

    /// Snapshot of all known hosts.
    #[inline]
    pub fn hosts(&self) -> Arc<Vec<Arc<Host>>> {
        self.registry.hosts()
    }

    #[inline]
    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }

    /// Connection pools of this session.
    #[inline]
    pub fn pools(&self) -> &Arc<ConnectionPoolManager<T, CM>> {
        &self.pools
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes all connection pools and stops reconnection. Every subsequent call fails with
    /// [`Error::SessionClosed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closing session.");
            self.pools.close();
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn complete(&self, response: QueryResponse) -> Result<QueryResult> {
        let schema_in_agreement = match response.body.as_schema_change() {
            Some(change) => {
                debug!(?change, "Schema changed. Waiting for agreement.");
                Some(
                    self.schema_agreement
                        .wait_for_agreement(self.schema_agreement_timeout)
                        .await,
                )
            }
            None => None,
        };

        Ok(QueryResult {
            body: response.body,
            coordinator: response.coordinator,
            schema_in_agreement,
        })
    }
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> Drop for Session<T, CM> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`Session`]s. Only the connection manager, the load balancing policy and at least
/// one contact point are required.
pub struct SessionBuilder<
    T: DispatchTransport + 'static,
    CM: ConnectionManager<T> + 'static,
    LB: LoadBalancingPolicy + 'static,
> {
    connection_manager: CM,
    load_balancing: LB,
    contact_points: Vec<Host>,
    retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
    reconnection_policy: Arc<dyn ReconnectionPolicy>,
    connection_pool_config: ConnectionPoolConfig,
    request_timeout: Duration,
    schema_agreement: SchemaAgreementConfig,
    default_consistency: Consistency,
    _transport: PhantomData<fn() -> T>,
}

impl<
        T: DispatchTransport + 'static,
        CM: ConnectionManager<T> + 'static,
        LB: LoadBalancingPolicy + 'static,
    > SessionBuilder<T, CM, LB>
{
    pub fn new(connection_manager: CM, load_balancing: LB) -> Self {
        SessionBuilder {
            connection_manager,
            load_balancing,
            contact_points: vec![],
            retry_policy: Arc::new(DefaultRetryPolicy),
            reconnection_policy: Arc::new(ExponentialReconnectionPolicy::default()),
            connection_pool_config: Default::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            schema_agreement: Default::default(),
            default_consistency: Consistency::One,
            _transport: PhantomData,
        }
    }

    /// Adds a known host.
    #[must_use]
    pub fn with_contact_point(mut self, host: Host) -> Self {
        self.contact_points.push(host);
        self
    }

    /// Adds known hosts.
    #[must_use]
    pub fn with_contact_points(mut self, hosts: impl IntoIterator<Item = Host>) -> Self {
        self.contact_points.extend(hosts);
        self
    }

    /// Sets new retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: Arc<dyn RetryPolicy + Send + Sync>) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Sets new reconnection policy.
    #[must_use]
    pub fn with_reconnection_policy(
        mut self,
        reconnection_policy: Arc<dyn ReconnectionPolicy>,
    ) -> Self {
        self.reconnection_policy = reconnection_policy;
        self
    }

    /// Sets new connection pool configuration.
    #[must_use]
    pub fn with_connection_pool_config(mut self, config: ConnectionPoolConfig) -> Self {
        self.connection_pool_config = config;
        self
    }

    /// Sets the deadline for a single request, across all the hosts it's tried on.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn with_schema_agreement_config(mut self, config: SchemaAgreementConfig) -> Self {
        self.schema_agreement = config;
        self
    }

    /// Sets consistency used by statements which don't specify their own.
    #[must_use]
    pub fn with_default_consistency(mut self, consistency: Consistency) -> Self {
        self.default_consistency = consistency;
        self
    }

    /// Builds the session. Connections are established lazily, on first use of each host.
    pub fn build(self) -> Result<Session<T, CM>> {
        if self.contact_points.is_empty() {
            return Err("No contact points given!".into());
        }

        let registry = Arc::new(HostRegistry::new());
        for host in self.contact_points {
            registry.register(host);
        }

        let load_balancing = Arc::new(InitializingWrapper::new(self.load_balancing));
        load_balancing.initialize(&registry.hosts());

        // the policy needs to see state changes before pools do, so it's subscribed first
        registry.subscribe(load_balancing.clone());

        let policy: Arc<dyn LoadBalancingPolicy> = load_balancing;
        let pools = ConnectionPoolManager::new(
            Arc::new(self.connection_manager),
            self.connection_pool_config,
            policy.clone(),
            self.reconnection_policy,
            &registry,
        );
        registry.subscribe(pools.clone());

        let prepared = Arc::new(PreparedStatementCache::new(pools.clone()));
        let executor = QueryExecutor::new(
            policy,
            registry.clone(),
            pools.clone(),
            prepared.clone(),
            self.retry_policy,
            self.request_timeout,
        );
        let schema_agreement = SchemaAgreementWaiter::new(
            registry.clone(),
            pools.clone(),
            self.schema_agreement.interval,
        );

        info!(hosts = registry.hosts().len(), "Session created.");

        Ok(Session {
            registry,
            pools,
            prepared,
            executor,
            schema_agreement,
            schema_agreement_timeout: self.schema_agreement.timeout,
            default_consistency: self.default_consistency,
            closed: AtomicBool::new(false),
        })
    }
}
