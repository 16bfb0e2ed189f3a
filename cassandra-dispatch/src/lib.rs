//! **cassandra-dispatch** is the cluster-aware routing and execution core of a Cassandra driver.
//!
//! It decides which hosts receive each request and in what order, keeps per-host connection pools
//! sized by host distance, fails over and retries according to pluggable policies, keeps prepared
//! statements consistent across hosts and waits for schema agreement after schema changes. Frame
//! encoding and sockets live behind the [`DispatchTransport`](transport::DispatchTransport) and
//! [`ConnectionManager`](cluster::ConnectionManager) traits.
//!
//! ## Getting started
//!
//! ```no_run
//! # use cassandra_dispatch::cluster::ConnectionManager;
//! # use cassandra_dispatch::transport::DispatchTransport;
//! use cassandra_dispatch::cluster::topology::Host;
//! use cassandra_dispatch::cluster::SessionBuilder;
//! use cassandra_dispatch::load_balancing::RoundRobinPolicy;
//!
//! # async fn run<T: DispatchTransport + 'static, CM: ConnectionManager<T> + 'static>(
//! #     connection_manager: CM,
//! # ) -> cassandra_dispatch::Result<()> {
//! let session = SessionBuilder::new(connection_manager, RoundRobinPolicy::new())
//!     .with_contact_point(Host::new("127.0.0.1:9042".parse().unwrap(), "dc1", "rack1"))
//!     .build()?;
//!
//! let result = session
//!     .query("CREATE KEYSPACE IF NOT EXISTS test_ks WITH REPLICATION = { \
//!             'class' : 'SimpleStrategy', 'replication_factor' : 1 };")
//!     .await?;
//! assert_eq!(result.schema_in_agreement, Some(true));
//! # Ok(())
//! # }
//! ```
//!
//! ## Hosts and load balancing
//!
//! Every host gets a distance from the load balancing policy, which determines how many
//! connections are kept to it and whether it's used at all. Take a look at the available
//! [load balancing policies](crate::load_balancing) to pick the one matching the cluster topology.

pub mod cluster;
pub mod future;
pub mod load_balancing;
pub mod retry;
pub mod statement;
pub mod transport;

pub use cassandra_dispatch_protocol::consistency;
pub use cassandra_dispatch_protocol::error;
pub use cassandra_dispatch_protocol::frame;
pub use cassandra_dispatch_protocol::types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
