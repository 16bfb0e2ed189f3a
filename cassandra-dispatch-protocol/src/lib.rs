//! Protocol vocabulary shared by the `cassandra-dispatch` driver core.
//!
//! Wire encoding is handled by an external codec; this crate only defines the values the routing
//! and execution engine needs to reason about: consistency levels, server error bodies, request and
//! response message kinds, and opaque byte identifiers.

pub mod consistency;
pub mod error;
pub mod frame;
pub mod types;

pub type Error = error::Error;
pub type Result<T> = error::Result<T>;
