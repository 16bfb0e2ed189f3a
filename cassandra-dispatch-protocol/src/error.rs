use crate::frame::message_error::ErrorBody;
use crate::types::CIntShort;
use std::fmt::Write;
use std::io;
use std::net::SocketAddr;
use std::result;
use thiserror::Error as ThisError;

pub type Result<T> = result::Result<T, Error>;

/// Driver error type. Errors are either returned by a server (`Server`) or raised within the
/// driver itself while routing and executing requests.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Transport level IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// General error
    #[error("General error: {0}")]
    General(String),
    /// Server error.
    #[error("Server {addr} error: {body:?}")]
    Server { body: ErrorBody, addr: SocketAddr },
    /// Timed out waiting for an operation to complete.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Unknown consistency.
    #[error("Unknown consistency: {0}")]
    UnknownConsistency(CIntShort),
    /// Every host in a query plan failed. Contains the terminal failure of each attempted host, in
    /// attempt order.
    #[error("No host available: {}", describe_host_errors(.errors))]
    NoHostAvailable { errors: Vec<(SocketAddr, Error)> },
    /// All connections to a host are at their in-flight cap and none freed in time. The host
    /// itself may be healthy.
    #[error("Connection pool exhausted for {addr}")]
    PoolExhausted { addr: SocketAddr },
    /// Host is down or ignored at connection acquisition time.
    #[error("Host {addr} unavailable")]
    HostUnavailable { addr: SocketAddr },
    /// Session has been closed.
    #[error("Session closed")]
    SessionClosed,
}

impl Error {
    /// Failures which indicate the host (or the path to it) is unusable: connection errors,
    /// transport timeouts and broken connections.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout(_))
    }

    /// Node reported the prepared statement id as unknown.
    pub fn is_unprepared(&self) -> bool {
        matches!(self, Error::Server { body, .. } if body.is_unprepared())
    }
}

fn describe_host_errors(errors: &[(SocketAddr, Error)]) -> String {
    if errors.is_empty() {
        return "no hosts were tried".into();
    }

    let mut result = String::new();
    for (index, (addr, error)) in errors.iter().enumerate() {
        if index > 0 {
            result.push_str("; ");
        }

        let _ = write!(result, "{addr}: {error}");
    }

    result
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::General(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Error {
        Error::General(err.to_string())
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Io(error) => Error::Io(io::Error::new(
                error.kind(),
                error
                    .get_ref()
                    .map(|error| error.to_string())
                    .unwrap_or_default(),
            )),
            Error::General(error) => Error::General(error.clone()),
            Error::Server { body, addr } => Error::Server {
                body: body.clone(),
                addr: *addr,
            },
            Error::Timeout(error) => Error::Timeout(error.clone()),
            Error::UnknownConsistency(value) => Error::UnknownConsistency(*value),
            Error::NoHostAvailable { errors } => Error::NoHostAvailable {
                errors: errors.clone(),
            },
            Error::PoolExhausted { addr } => Error::PoolExhausted { addr: *addr },
            Error::HostUnavailable { addr } => Error::HostUnavailable { addr: *addr },
            Error::SessionClosed => Error::SessionClosed,
        }
    }
}
