pub use crate::cluster::connection_manager::ConnectionManager;
pub use crate::cluster::connection_pool::{ConnectionPool, ConnectionPoolConfig, PooledConnection};
pub use crate::cluster::connection_pool_manager::ConnectionPoolManager;
pub use crate::cluster::host_listener::HostStateListener;
pub use crate::cluster::host_registry::HostRegistry;
pub use crate::cluster::prepared_cache::{PreparedStatement, PreparedStatementCache};
pub use crate::cluster::query_executor::{QueryExecutor, QueryResponse};
pub use crate::cluster::schema_agreement::{SchemaAgreementConfig, SchemaAgreementWaiter};
pub use crate::cluster::session::{QueryResult, Session, SessionBuilder};
pub use crate::cluster::token_map::TokenMap;

mod connection_manager;
mod connection_pool;
mod connection_pool_manager;
mod host_listener;
mod host_registry;
mod prepared_cache;
mod query_executor;
mod schema_agreement;
pub mod session;
mod token_map;
pub mod topology;
