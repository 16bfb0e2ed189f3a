use derive_more::{Constructor, Display};
use std::net::SocketAddr;

use crate::consistency::Consistency;
use crate::frame::message_error::{
    ReadTimeoutError, UnavailableError, WriteTimeoutError, WriteType,
};

#[derive(Debug, PartialEq, Eq, Ord, PartialOrd, Hash, Copy, Clone, Display)]
pub enum RetryDecision {
    /// Send the request again to the same host.
    RetrySameHost,
    /// Move on to the next host in the query plan.
    RetryNextHost,
    /// Return the error to the caller.
    Rethrow,
}

/// Information about a failed request.
#[derive(Debug, Clone, Copy, Constructor)]
pub struct QueryInfo {
    /// Host which reported the error.
    pub host: SocketAddr,
    pub consistency: Option<Consistency>,
    pub is_idempotent: bool,
}

/// Retry policy determines what to do when a host reports that it couldn't satisfy the requested
/// consistency. `retry_count` is the number of retries already made for the request, across all
/// hosts.
pub trait RetryPolicy: Send + Sync {
    /// Not enough replicas responded to a read before the timeout.
    fn on_read_timeout(
        &self,
        query_info: &QueryInfo,
        error: &ReadTimeoutError,
        retry_count: usize,
    ) -> RetryDecision;

    /// Not enough replicas acknowledged a write before the timeout.
    fn on_write_timeout(
        &self,
        query_info: &QueryInfo,
        error: &WriteTimeoutError,
        retry_count: usize,
    ) -> RetryDecision;

    /// The coordinator knew up front that not enough replicas were alive.
    fn on_unavailable(
        &self,
        query_info: &QueryInfo,
        error: &UnavailableError,
        retry_count: usize,
    ) -> RetryDecision;

    /// The coordinator itself failed (overloaded, bootstrapping or an internal error).
    fn on_coordinator_error(&self, _query_info: &QueryInfo, _retry_count: usize) -> RetryDecision {
        RetryDecision::Rethrow
    }
}

/// Forwards all errors directly to the user, never retries
#[derive(Default, Debug, Clone, Copy)]
pub struct FallthroughRetryPolicy;

impl RetryPolicy for FallthroughRetryPolicy {
    fn on_read_timeout(&self, _: &QueryInfo, _: &ReadTimeoutError, _: usize) -> RetryDecision {
        RetryDecision::Rethrow
    }

    fn on_write_timeout(&self, _: &QueryInfo, _: &WriteTimeoutError, _: usize) -> RetryDecision {
        RetryDecision::Rethrow
    }

    fn on_unavailable(&self, _: &QueryInfo, _: &UnavailableError, _: usize) -> RetryDecision {
        RetryDecision::Rethrow
    }
}

/// Default retry policy - retries when there is a high chance that a retry might help.  
/// Behaviour based on [DataStax Java Driver](https://docs.datastax.com/en/developer/java-driver/4.10/manual/core/retries/)
#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn on_read_timeout(
        &self,
        _query_info: &QueryInfo,
        error: &ReadTimeoutError,
        retry_count: usize,
    ) -> RetryDecision {
        // enough replicas answered, but the data replica didn't - a retry will likely succeed
        if retry_count == 0 && error.received >= error.block_for && !error.replica_has_responded()
        {
            RetryDecision::RetrySameHost
        } else {
            RetryDecision::Rethrow
        }
    }

    fn on_write_timeout(
        &self,
        query_info: &QueryInfo,
        error: &WriteTimeoutError,
        retry_count: usize,
    ) -> RetryDecision {
        if retry_count == 0 && query_info.is_idempotent && error.write_type == WriteType::BatchLog
        {
            RetryDecision::RetrySameHost
        } else {
            RetryDecision::Rethrow
        }
    }

    fn on_unavailable(
        &self,
        _query_info: &QueryInfo,
        _error: &UnavailableError,
        retry_count: usize,
    ) -> RetryDecision {
        if retry_count == 0 {
            RetryDecision::RetryNextHost
        } else {
            RetryDecision::Rethrow
        }
    }

    fn on_coordinator_error(&self, query_info: &QueryInfo, _retry_count: usize) -> RetryDecision {
        if query_info.is_idempotent {
            RetryDecision::RetryNextHost
        } else {
            RetryDecision::Rethrow
        }
    }
}
