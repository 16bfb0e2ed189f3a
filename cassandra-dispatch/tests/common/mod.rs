#![allow(dead_code)]

use bytes::Bytes;
use futures::FutureExt;
use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use cassandra_dispatch::cluster::topology::{Host, HostState};
use cassandra_dispatch::cluster::{ConnectionManager, Session, SessionBuilder};
use cassandra_dispatch::error::{Error, Result};
use cassandra_dispatch::frame::message_error::{AdditionalErrorInfo, ErrorBody, UnpreparedError};
use cassandra_dispatch::frame::message_result::{
    ResResultBody, SchemaChange, SchemaChangeTarget, SchemaChangeType,
};
use cassandra_dispatch::frame::{RequestBody, ResponseBody};
use cassandra_dispatch::future::BoxFuture;
use cassandra_dispatch::load_balancing::LoadBalancingPolicy;
use cassandra_dispatch::transport::DispatchTransport;
use cassandra_dispatch::types::PreparedId;

pub type FakeSession = Session<FakeTransport, FakeConnectionManager>;

/// In-memory stand-in for a single database node.
pub struct FakeNode {
    pub address: SocketAddr,
    pub down: AtomicBool,
    /// Node claims not to know any prepared statement on execution.
    pub always_unprepared: AtomicBool,
    pub schema_version: Mutex<Uuid>,
    pub latency: Mutex<Duration>,
    pub requests: AtomicUsize,
    pub prepares: AtomicUsize,
    pub executes: AtomicUsize,
    prepared: Mutex<HashMap<PreparedId, String>>,
}

impl FakeNode {
    fn new(address: SocketAddr, schema_version: Uuid) -> Self {
        FakeNode {
            address,
            down: AtomicBool::new(false),
            always_unprepared: AtomicBool::new(false),
            schema_version: Mutex::new(schema_version),
            latency: Mutex::new(Duration::ZERO),
            requests: AtomicUsize::new(0),
            prepares: AtomicUsize::new(0),
            executes: AtomicUsize::new(0),
            prepared: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn set_schema_version(&self, version: Uuid) {
        *self.schema_version.lock().unwrap() = version;
    }

    /// Simulates a restart, which wipes the prepared statement cache.
    pub fn forget_prepared(&self) {
        self.prepared.lock().unwrap().clear();
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    fn prepared_id(&self, query: &str) -> PreparedId {
        PreparedId::from(format!("{}#{query}", self.address).into_bytes())
    }
}

/// In-memory cluster with a single table of rows. Each row remembers how many times it was
/// inserted.
pub struct FakeCluster {
    nodes: Vec<Arc<FakeNode>>,
    rows: Mutex<HashMap<Bytes, usize>>,
    prepares_in_flight: Mutex<HashMap<(SocketAddr, String), usize>>,
    max_prepares_in_flight: AtomicUsize,
}

impl FakeCluster {
    pub fn new(node_count: u8) -> Arc<Self> {
        let version = Uuid::new_v4();
        let nodes = (1..=node_count)
            .map(|index| {
                let address = format!("127.0.0.{index}:9042").parse().unwrap();
                Arc::new(FakeNode::new(address, version))
            })
            .collect();

        Arc::new(FakeCluster {
            nodes,
            rows: Mutex::new(HashMap::new()),
            prepares_in_flight: Mutex::new(HashMap::new()),
            max_prepares_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn nodes(&self) -> &[Arc<FakeNode>] {
        &self.nodes
    }

    pub fn node(&self, address: SocketAddr) -> &Arc<FakeNode> {
        self.nodes
            .iter()
            .find(|node| node.address == address)
            .unwrap()
    }

    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.nodes.iter().map(|node| node.address).collect()
    }

    /// Contact points, already known to be up.
    pub fn hosts(&self) -> Vec<Host> {
        self.nodes
            .iter()
            .map(|node| Host::with_state(node.address, "dc1", "rack1", HostState::Up))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Number of successful inserts, including ones which overwrote an existing row.
    pub fn insert_count(&self) -> usize {
        self.rows.lock().unwrap().values().sum()
    }

    /// Highest number of prepares observed in flight for a single (node, query) pair.
    pub fn max_prepares_in_flight(&self) -> usize {
        self.max_prepares_in_flight.load(Ordering::SeqCst)
    }

    pub fn connection_manager(self: &Arc<Self>) -> FakeConnectionManager {
        FakeConnectionManager {
            cluster: self.clone(),
        }
    }

    pub fn session_builder<LB: LoadBalancingPolicy + 'static>(
        self: &Arc<Self>,
        load_balancing: LB,
    ) -> SessionBuilder<FakeTransport, FakeConnectionManager, LB> {
        SessionBuilder::new(self.connection_manager(), load_balancing)
            .with_contact_points(self.hosts())
    }

    async fn handle(&self, node: &FakeNode, request: &RequestBody) -> Result<ResponseBody> {
        node.requests.fetch_add(1, Ordering::SeqCst);

        let latency = *node.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match request {
            RequestBody::Query(body) => Ok(self.handle_query(&body.query)),
            RequestBody::Prepare(body) => Ok(self.handle_prepare(node, &body.query).await),
            RequestBody::Execute(body) => {
                node.executes.fetch_add(1, Ordering::SeqCst);

                let query = node.prepared.lock().unwrap().get(&body.id).cloned();
                match query {
                    Some(query) if !node.always_unprepared.load(Ordering::SeqCst) => {
                        if query.starts_with("INSERT") {
                            *self
                                .rows
                                .lock()
                                .unwrap()
                                .entry(body.values.clone())
                                .or_default() += 1;
                        }

                        Ok(ResponseBody::Result(ResResultBody::Void))
                    }
                    _ => Ok(ResponseBody::Error(ErrorBody::new(
                        "Prepared query not found",
                        AdditionalErrorInfo::Unprepared(UnpreparedError::new(body.id.clone())),
                    ))),
                }
            }
            RequestBody::SchemaVersion => Ok(ResponseBody::SchemaVersion(
                *node.schema_version.lock().unwrap(),
            )),
        }
    }

    fn handle_query(&self, query: &str) -> ResponseBody {
        if query.starts_with("CREATE") {
            ResponseBody::Result(ResResultBody::SchemaChange(SchemaChange::new(
                SchemaChangeType::Created,
                SchemaChangeTarget::Table,
                "test_ks".into(),
                Some("test_table".into()),
            )))
        } else if query.starts_with("SELECT") {
            let count = self.row_count() as u32;
            ResponseBody::Result(ResResultBody::Rows(Bytes::copy_from_slice(
                &count.to_be_bytes(),
            )))
        } else {
            ResponseBody::Error(ErrorBody::new(
                format!("line 1:0 no viable alternative at input '{query}'"),
                AdditionalErrorInfo::Syntax,
            ))
        }
    }

    async fn handle_prepare(&self, node: &FakeNode, query: &str) -> ResponseBody {
        node.prepares.fetch_add(1, Ordering::SeqCst);

        let key = (node.address, query.to_string());
        {
            let mut in_flight = self.prepares_in_flight.lock().unwrap();
            let count = in_flight.entry(key.clone()).or_default();
            *count += 1;
            self.max_prepares_in_flight
                .fetch_max(*count, Ordering::SeqCst);
        }

        // give concurrent prepares a chance to overlap
        tokio::task::yield_now().await;

        if let Some(count) = self.prepares_in_flight.lock().unwrap().get_mut(&key) {
            *count -= 1;
        }

        let id = node.prepared_id(query);
        node.prepared
            .lock()
            .unwrap()
            .insert(id.clone(), query.to_string());

        ResponseBody::Result(ResResultBody::Prepared(id))
    }
}

pub struct FakeTransport {
    cluster: Arc<FakeCluster>,
    node: Arc<FakeNode>,
    broken: AtomicBool,
}

impl DispatchTransport for FakeTransport {
    fn send<'a>(&'a self, request: &'a RequestBody) -> BoxFuture<'a, Result<ResponseBody>> {
        async move {
            if self.node.down.load(Ordering::SeqCst) {
                self.broken.store(true, Ordering::SeqCst);
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }

            self.cluster.handle(&self.node, request).await
        }
        .boxed()
    }

    fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    fn address(&self) -> SocketAddr {
        self.node.address
    }
}

pub struct FakeConnectionManager {
    cluster: Arc<FakeCluster>,
}

impl ConnectionManager<FakeTransport> for FakeConnectionManager {
    fn connection(&self, addr: SocketAddr) -> BoxFuture<Result<FakeTransport>> {
        let cluster = self.cluster.clone();
        async move {
            let node = cluster.node(addr).clone();
            if node.down.load(Ordering::SeqCst) {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("connection refused: {addr}"),
                )));
            }

            Ok(FakeTransport {
                cluster,
                node,
                broken: AtomicBool::new(false),
            })
        }
        .boxed()
    }
}
