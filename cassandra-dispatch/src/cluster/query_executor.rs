use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::*;

use crate::cluster::topology::Host;
use crate::cluster::{
    ConnectionManager, ConnectionPoolManager, HostRegistry, PreparedStatement,
    PreparedStatementCache,
};
use crate::consistency::Consistency;
use crate::error::{Error, Result};
use crate::frame::message_error::{AdditionalErrorInfo, UnpreparedError};
use crate::frame::message_request::{BodyReqExecute, BodyReqQuery};
use crate::frame::message_result::ResResultBody;
use crate::frame::{RequestBody, ResponseBody};
use crate::load_balancing::{LoadBalancingPolicy, Request};
use crate::retry::{QueryInfo, RetryDecision, RetryPolicy};
use crate::statement::StatementParams;
use crate::transport::DispatchTransport;
use crate::types::RoutingKey;

/// Successful response along with the host which produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    pub body: ResResultBody,
    pub coordinator: SocketAddr,
}

enum Action<'a> {
    Send(RequestBody),
    Execute {
        statement: &'a Arc<PreparedStatement>,
        consistency: Consistency,
        values: Bytes,
    },
    Prepare(&'a Arc<PreparedStatement>),
}

impl Action<'_> {
    fn consistency(&self) -> Option<Consistency> {
        match self {
            Action::Send(request) => request.consistency(),
            Action::Execute { consistency, .. } => Some(*consistency),
            Action::Prepare(_) => None,
        }
    }
}

struct Routing<'a> {
    keyspace: Option<&'a str>,
    routing_key: Option<&'a RoutingKey>,
    is_idempotent: bool,
    retry_policy: Option<&'a (dyn RetryPolicy + Send + Sync)>,
}

impl<'a> Routing<'a> {
    fn from_params(params: &'a StatementParams, default_keyspace: Option<&'a str>) -> Self {
        Routing {
            keyspace: params.keyspace.as_deref().or(default_keyspace),
            routing_key: params.routing_key.as_ref(),
            is_idempotent: params.is_idempotent,
            retry_policy: params.retry_policy.as_deref(),
        }
    }
}

/// Drives a single request across a query plan. Each plan host is tried in order until one of
/// them produces a result, an error which shouldn't be retried, or the request deadline passes.
///
/// Host failures are reported to the registry: transport failures mark the host down, while the
/// first success against a host which isn't known to be up marks it up.
pub struct QueryExecutor<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> {
    policy: Arc<dyn LoadBalancingPolicy>,
    registry: Arc<HostRegistry>,
    pools: Arc<ConnectionPoolManager<T, CM>>,
    prepared: Arc<PreparedStatementCache<T, CM>>,
    retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
    request_timeout: Duration,
}

impl<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static> QueryExecutor<T, CM> {
    pub fn new(
        policy: Arc<dyn LoadBalancingPolicy>,
        registry: Arc<HostRegistry>,
        pools: Arc<ConnectionPoolManager<T, CM>>,
        prepared: Arc<PreparedStatementCache<T, CM>>,
        retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
        request_timeout: Duration,
    ) -> Self {
        QueryExecutor {
            policy,
            registry,
            pools,
            prepared,
            retry_policy,
            request_timeout,
        }
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Executes a raw query.
    pub async fn query(
        &self,
        query: &str,
        params: &StatementParams,
        consistency: Consistency,
    ) -> Result<QueryResponse> {
        let request = RequestBody::Query(BodyReqQuery::new(
            query.to_string(),
            consistency,
            params.values.clone(),
            params.keyspace.clone(),
        ));

        self.run(Action::Send(request), Routing::from_params(params, None))
            .await
    }

    /// Executes a prepared statement, preparing it on hosts which don't know it yet.
    pub async fn execute(
        &self,
        statement: &Arc<PreparedStatement>,
        params: &StatementParams,
        consistency: Consistency,
    ) -> Result<QueryResponse> {
        let action = Action::Execute {
            statement,
            consistency,
            values: params.values.clone(),
        };

        self.run(action, Routing::from_params(params, statement.keyspace()))
            .await
    }

    /// Prepares a statement on the first host in the plan which accepts it.
    pub async fn prepare(&self, statement: &Arc<PreparedStatement>) -> Result<QueryResponse> {
        let routing = Routing {
            keyspace: statement.keyspace(),
            routing_key: None,
            is_idempotent: true,
            retry_policy: None,
        };

        self.run(Action::Prepare(statement), routing).await
    }

    async fn run(&self, action: Action<'_>, routing: Routing<'_>) -> Result<QueryResponse> {
        tokio::time::timeout(self.request_timeout, self.run_plan(&action, &routing))
            .await
            .map_err(|_| {
                debug!(timeout = ?self.request_timeout, "Request deadline passed.");
                Error::Timeout(format!(
                    "Request not completed within {:?}",
                    self.request_timeout
                ))
            })
            .and_then(|result| result)
    }

    async fn run_plan(&self, action: &Action<'_>, routing: &Routing<'_>) -> Result<QueryResponse> {
        let consistency = action.consistency();
        let query_plan = self.policy.new_query_plan(Some(Request::new(
            routing.keyspace,
            routing.routing_key,
            consistency,
        )));

        let retry_policy = routing.retry_policy.unwrap_or(&*self.retry_policy);
        let mut errors = vec![];
        let mut retry_count = 0;

        'next_host: for host in query_plan {
            let address = host.address();
            let mut reprepared = false;
            let mut pending_error = None;

            loop {
                let result = match pending_error.take() {
                    Some(error) => Err(error),
                    None => self.attempt(&host, action).await,
                };

                let error = match result {
                    Ok(body) => {
                        if !host.is_up() {
                            self.registry.mark_up(address);
                        }

                        return Ok(QueryResponse {
                            body,
                            coordinator: address,
                        });
                    }
                    Err(error) => error,
                };

                if error.is_transport_error() {
                    warn!(%address, %error, "Transport failure. Marking host down.");
                    self.registry.mark_down(address);
                    errors.push((address, error));
                    continue 'next_host;
                }

                let body = match &error {
                    Error::PoolExhausted { .. } | Error::HostUnavailable { .. } => {
                        debug!(%address, %error, "Host not usable. Moving on.");
                        errors.push((address, error));
                        continue 'next_host;
                    }
                    Error::Server { body, .. } => body,
                    _ => return Err(error),
                };

                let query_info = QueryInfo::new(address, consistency, routing.is_idempotent);
                let decision = match &body.additional_info {
                    AdditionalErrorInfo::Unprepared(UnpreparedError { id }) => {
                        match action {
                            Action::Execute { statement, .. } if !reprepared => {
                                reprepared = true;
                                if let Err(error) =
                                    self.prepared.reprepare(statement, &host, id).await
                                {
                                    pending_error = Some(error);
                                }

                                continue;
                            }
                            _ => {
                                warn!(%address, "Host keeps reporting statement as unprepared.");
                                RetryDecision::RetryNextHost
                            }
                        }
                    }
                    AdditionalErrorInfo::Unavailable(unavailable) => {
                        retry_policy.on_unavailable(&query_info, unavailable, retry_count)
                    }
                    AdditionalErrorInfo::ReadTimeout(read_timeout) => {
                        retry_policy.on_read_timeout(&query_info, read_timeout, retry_count)
                    }
                    AdditionalErrorInfo::WriteTimeout(write_timeout) => {
                        retry_policy.on_write_timeout(&query_info, write_timeout, retry_count)
                    }
                    AdditionalErrorInfo::Overloaded
                    | AdditionalErrorInfo::IsBootstrapping
                    | AdditionalErrorInfo::Server
                    | AdditionalErrorInfo::Truncate => {
                        retry_policy.on_coordinator_error(&query_info, retry_count)
                    }
                    _ => return Err(error),
                };

                debug!(%address, %decision, retry_count, "Retry decision made.");

                match decision {
                    RetryDecision::RetrySameHost => {
                        retry_count += 1;
                        continue;
                    }
                    RetryDecision::RetryNextHost => {
                        if !body.is_unprepared() {
                            retry_count += 1;
                        }

                        errors.push((address, error));
                        continue 'next_host;
                    }
                    RetryDecision::Rethrow => return Err(error),
                }
            }
        }

        if let Some((address, _)) = errors.first() {
            if errors
                .iter()
                .all(|(_, error)| matches!(error, Error::PoolExhausted { .. }))
            {
                return Err(Error::PoolExhausted { addr: *address });
            }
        }

        warn!(attempted = errors.len(), "Query plan exhausted.");
        Err(Error::NoHostAvailable { errors })
    }

    async fn attempt(&self, host: &Arc<Host>, action: &Action<'_>) -> Result<ResResultBody> {
        match action {
            Action::Send(request) => self.send(host, request).await,
            Action::Execute {
                statement,
                consistency,
                values,
            } => {
                let id = self.prepared.ensure_prepared(statement, host).await?;
                let request =
                    RequestBody::Execute(BodyReqExecute::new(id, *consistency, values.clone()));

                self.send(host, &request).await
            }
            Action::Prepare(statement) => self
                .prepared
                .ensure_prepared(statement, host)
                .await
                .map(ResResultBody::Prepared),
        }
    }

    async fn send(&self, host: &Arc<Host>, request: &RequestBody) -> Result<ResResultBody> {
        let address = host.address();
        let connection = self.pools.acquire(host).await?;

        match connection.send(request).await? {
            ResponseBody::Result(result) => Ok(result),
            ResponseBody::Error(body) => Err(Error::Server {
                body,
                addr: address,
            }),
            response => Err(Error::General(format!(
                "Unexpected response from {address}: {response:?}"
            ))),
        }
    }
}

//noinspection DuplicatedCode
#[cfg(test)]
mod tests {
    use futures::FutureExt;
    use lazy_static::lazy_static;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::QueryExecutor;
    use crate::cluster::topology::{Host, HostState};
    use crate::cluster::{
        ConnectionManager, ConnectionPoolConfig, ConnectionPoolManager, HostRegistry,
        PreparedStatementCache,
    };
    use crate::consistency::Consistency;
    use crate::error::{Error, Result};
    use crate::frame::message_error::{
        AdditionalErrorInfo, ErrorBody, ReadTimeoutError, UnavailableError,
    };
    use crate::frame::message_result::ResResultBody;
    use crate::frame::{RequestBody, ResponseBody};
    use crate::future::BoxFuture;
    use crate::load_balancing::{LoadBalancingPolicy, RoundRobinPolicy};
    use crate::retry::{
        DefaultRetryPolicy, FallthroughRetryPolicy, NeverReconnectionPolicy, RetryPolicy,
    };
    use crate::statement::{StatementParams, StatementParamsBuilder};
    use crate::transport::DispatchTransport;

    lazy_static! {
        static ref ADDRESS_1: SocketAddr = "127.0.0.1:9042".parse().unwrap();
        static ref ADDRESS_2: SocketAddr = "127.0.0.2:9042".parse().unwrap();
    }

    type Script = dyn Fn(SocketAddr, usize) -> Result<ResponseBody> + Send + Sync;

    struct ScriptedTransport {
        address: SocketAddr,
        script: Arc<Script>,
        delay: Duration,
        attempts: Arc<[AtomicUsize; 2]>,
    }

    fn host_index(address: SocketAddr) -> usize {
        usize::from(address != *ADDRESS_1)
    }

    impl DispatchTransport for ScriptedTransport {
        fn send<'a>(&'a self, _request: &'a RequestBody) -> BoxFuture<'a, Result<ResponseBody>> {
            async move {
                let attempt =
                    self.attempts[host_index(self.address)].fetch_add(1, Ordering::SeqCst) + 1;

                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }

                (self.script)(self.address, attempt)
            }
            .boxed()
        }

        fn is_broken(&self) -> bool {
            false
        }

        fn address(&self) -> SocketAddr {
            self.address
        }
    }

    struct ScriptedConnectionManager {
        script: Arc<Script>,
        delay: Duration,
        attempts: Arc<[AtomicUsize; 2]>,
    }

    impl ConnectionManager<ScriptedTransport> for ScriptedConnectionManager {
        fn connection(&self, addr: SocketAddr) -> BoxFuture<Result<ScriptedTransport>> {
            let transport = ScriptedTransport {
                address: addr,
                script: self.script.clone(),
                delay: self.delay,
                attempts: self.attempts.clone(),
            };

            async move { Ok(transport) }.boxed()
        }
    }

    struct Fixture {
        registry: Arc<HostRegistry>,
        executor: QueryExecutor<ScriptedTransport, ScriptedConnectionManager>,
        attempts: Arc<[AtomicUsize; 2]>,
    }

    impl Fixture {
        fn attempts(&self, address: SocketAddr) -> usize {
            self.attempts[host_index(address)].load(Ordering::SeqCst)
        }
    }

    fn fixture(
        retry_policy: Arc<dyn RetryPolicy + Send + Sync>,
        delay: Duration,
        script: impl Fn(SocketAddr, usize) -> Result<ResponseBody> + Send + Sync + 'static,
    ) -> Fixture {
        let registry = Arc::new(HostRegistry::new());
        registry.register(Host::with_state(*ADDRESS_1, "dc1", "rack1", HostState::Up));
        registry.register(Host::with_state(*ADDRESS_2, "dc1", "rack1", HostState::Up));

        let policy = Arc::new(RoundRobinPolicy::new());
        policy.initialize(&registry.hosts());
        registry.subscribe(policy.clone());

        let attempts = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0)]);
        let pools = ConnectionPoolManager::new(
            Arc::new(ScriptedConnectionManager {
                script: Arc::new(script),
                delay,
                attempts: attempts.clone(),
            }),
            ConnectionPoolConfig::default(),
            policy.clone(),
            Arc::new(NeverReconnectionPolicy),
            &registry,
        );
        registry.subscribe(pools.clone());

        let prepared = Arc::new(PreparedStatementCache::new(pools.clone()));
        let executor = QueryExecutor::new(
            policy,
            registry.clone(),
            pools,
            prepared,
            retry_policy,
            Duration::from_secs(1),
        );

        Fixture {
            registry,
            executor,
            attempts,
        }
    }

    fn rows() -> Result<ResponseBody> {
        Ok(ResponseBody::Result(ResResultBody::Rows(Default::default())))
    }

    fn server_error(info: AdditionalErrorInfo) -> Result<ResponseBody> {
        Ok(ResponseBody::Error(ErrorBody::new("error", info)))
    }

    fn connection_reset() -> Result<ResponseBody> {
        Err(Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    }

    async fn query(fixture: &Fixture, params: &StatementParams) -> Result<super::QueryResponse> {
        fixture
            .executor
            .query("SELECT * FROM t", params, Consistency::One)
            .await
    }

    #[tokio::test]
    async fn should_fail_over_and_mark_host_down() {
        let fixture = fixture(Arc::new(DefaultRetryPolicy), Duration::ZERO, |address, _| {
            if address == *ADDRESS_1 {
                connection_reset()
            } else {
                rows()
            }
        });

        let response = query(&fixture, &Default::default()).await.unwrap();

        assert_eq!(response.coordinator, *ADDRESS_2);
        assert!(fixture.registry.get(*ADDRESS_1).unwrap().is_down());

        // down host is skipped from now on
        let response = query(&fixture, &Default::default()).await.unwrap();
        assert_eq!(response.coordinator, *ADDRESS_2);
        assert_eq!(fixture.attempts(*ADDRESS_1), 1);
    }

    #[tokio::test]
    async fn should_aggregate_errors_on_plan_exhaustion() {
        let fixture = fixture(Arc::new(DefaultRetryPolicy), Duration::ZERO, |_, _| {
            connection_reset()
        });

        let error = query(&fixture, &Default::default()).await.unwrap_err();

        match error {
            Error::NoHostAvailable { errors } => {
                let addresses: Vec<_> = errors.iter().map(|(address, _)| *address).collect();
                assert_eq!(addresses, vec![*ADDRESS_1, *ADDRESS_2]);
                assert!(errors.iter().all(|(_, error)| error.is_transport_error()));
            }
            error => panic!("unexpected error: {}", error),
        }
    }

    #[tokio::test]
    async fn should_return_syntax_error_immediately() {
        let fixture = fixture(Arc::new(DefaultRetryPolicy), Duration::ZERO, |_, _| {
            server_error(AdditionalErrorInfo::Syntax)
        });

        let error = query(&fixture, &Default::default()).await.unwrap_err();

        assert!(matches!(error, Error::Server { addr, .. } if addr == *ADDRESS_1));
        assert_eq!(fixture.attempts(*ADDRESS_2), 0);
        assert!(fixture.registry.get(*ADDRESS_1).unwrap().is_up());
    }

    #[tokio::test]
    async fn should_follow_retry_policy_on_unavailable() {
        let unavailable = || {
            server_error(AdditionalErrorInfo::Unavailable(UnavailableError::new(
                Consistency::Quorum,
                3,
                1,
            )))
        };

        let fixture = fixture(
            Arc::new(DefaultRetryPolicy),
            Duration::ZERO,
            move |address, _| {
                if address == *ADDRESS_1 {
                    unavailable()
                } else {
                    rows()
                }
            },
        );

        let response = query(&fixture, &Default::default()).await.unwrap();
        assert_eq!(response.coordinator, *ADDRESS_2);

        // round-robin moves the next plan head to ADDRESS_2, so rotate back to ADDRESS_1
        let response = query(&fixture, &Default::default()).await.unwrap();
        assert_eq!(response.coordinator, *ADDRESS_2);
        assert_eq!(fixture.attempts(*ADDRESS_2), 2);

        // statement level policy takes precedence
        let params = StatementParamsBuilder::new()
            .with_retry_policy(Arc::new(FallthroughRetryPolicy))
            .build();
        let error = query(&fixture, &params).await.unwrap_err();
        assert!(matches!(error, Error::Server { addr, .. } if addr == *ADDRESS_1));
        assert_eq!(fixture.attempts(*ADDRESS_1), 2);
        assert_eq!(fixture.attempts(*ADDRESS_2), 2);
    }

    #[tokio::test]
    async fn should_retry_read_timeout_on_same_host() {
        let fixture = fixture(
            Arc::new(DefaultRetryPolicy),
            Duration::ZERO,
            |_, attempt| {
                if attempt == 1 {
                    server_error(AdditionalErrorInfo::ReadTimeout(ReadTimeoutError::new(
                        Consistency::One,
                        1,
                        1,
                        false,
                    )))
                } else {
                    rows()
                }
            },
        );

        let response = query(&fixture, &Default::default()).await.unwrap();

        assert_eq!(response.coordinator, *ADDRESS_1);
        assert_eq!(fixture.attempts(*ADDRESS_1), 2);
        assert_eq!(fixture.attempts(*ADDRESS_2), 0);
    }

    #[tokio::test]
    async fn should_fail_without_eligible_hosts() {
        let fixture = fixture(Arc::new(DefaultRetryPolicy), Duration::ZERO, |_, _| rows());
        for host in fixture.registry.hosts().iter() {
            fixture.registry.mark_down(host.address());
        }

        // down hosts aren't in the plan at all
        let error = query(&fixture, &Default::default()).await.unwrap_err();
        assert!(matches!(error, Error::NoHostAvailable { errors } if errors.is_empty()));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn should_time_out_slow_request() {
        let fixture = fixture(
            Arc::new(DefaultRetryPolicy),
            Duration::from_secs(10),
            |_, _| rows(),
        );

        let error = query(&fixture, &Default::default()).await.unwrap_err();

        assert!(matches!(error, Error::Timeout(_)));
        assert_eq!(fixture.attempts(*ADDRESS_2), 0);
    }
}
