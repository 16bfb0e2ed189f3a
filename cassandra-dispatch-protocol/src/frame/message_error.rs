/// This module contains [Cassandra's errors](<https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec>)
/// which a server could respond with. Decoding is done by the codec; the driver core only inspects
/// the decoded values to classify failures.
use crate::consistency::Consistency;
use crate::types::*;
use derive_more::{Constructor, Display};

/// Error returned by a Cassandra server as a response. As in the native protocol, it contains an
/// error code and an error message. Depending on the type of error, it could contain additional
/// information represented by the `additional_info` property.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ErrorBody {
    /// `CInt` that points to a type of error.
    pub error_code: CInt,
    /// Error message string.
    pub message: String,
    /// Additional information.
    pub additional_info: AdditionalErrorInfo,
}

impl ErrorBody {
    /// Creates a body with the error code matching given additional info.
    pub fn new(message: impl Into<String>, additional_info: AdditionalErrorInfo) -> Self {
        ErrorBody {
            error_code: additional_info.code(),
            message: message.into(),
            additional_info,
        }
    }

    #[inline]
    pub fn is_unprepared(&self) -> bool {
        matches!(self.additional_info, AdditionalErrorInfo::Unprepared(_))
    }
}

/// Additional error info in accordance to
/// [Cassandra protocol v4]
/// (<https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec>).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AdditionalErrorInfo {
    Server,
    Protocol,
    Authentication,
    Unavailable(UnavailableError),
    Overloaded,
    IsBootstrapping,
    Truncate,
    WriteTimeout(WriteTimeoutError),
    ReadTimeout(ReadTimeoutError),
    ReadFailure,
    FunctionFailure,
    WriteFailure,
    Syntax,
    Unauthorized,
    Invalid,
    Config,
    AlreadyExists(AlreadyExistsError),
    Unprepared(UnpreparedError),
}

impl AdditionalErrorInfo {
    /// Protocol error code of this kind of error.
    pub fn code(&self) -> CInt {
        match self {
            AdditionalErrorInfo::Server => 0x0000,
            AdditionalErrorInfo::Protocol => 0x000A,
            AdditionalErrorInfo::Authentication => 0x0100,
            AdditionalErrorInfo::Unavailable(_) => 0x1000,
            AdditionalErrorInfo::Overloaded => 0x1001,
            AdditionalErrorInfo::IsBootstrapping => 0x1002,
            AdditionalErrorInfo::Truncate => 0x1003,
            AdditionalErrorInfo::WriteTimeout(_) => 0x1100,
            AdditionalErrorInfo::ReadTimeout(_) => 0x1200,
            AdditionalErrorInfo::ReadFailure => 0x1300,
            AdditionalErrorInfo::FunctionFailure => 0x1400,
            AdditionalErrorInfo::WriteFailure => 0x1500,
            AdditionalErrorInfo::Syntax => 0x2000,
            AdditionalErrorInfo::Unauthorized => 0x2100,
            AdditionalErrorInfo::Invalid => 0x2200,
            AdditionalErrorInfo::Config => 0x2300,
            AdditionalErrorInfo::AlreadyExists(_) => 0x2400,
            AdditionalErrorInfo::Unprepared(_) => 0x2500,
        }
    }
}

/// Additional info about
/// [unavailable exception]
/// (<https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec>)
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Copy, Clone, Hash, Constructor)]
pub struct UnavailableError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// Number of nodes that should be available to respect `cl`.
    pub required: CInt,
    /// Number of replicas that we were know to be alive.
    pub alive: CInt,
}

/// Timeout exception during a write request.
#[derive(Debug, PartialEq, Copy, Clone, Ord, PartialOrd, Eq, Hash, Constructor)]
pub struct WriteTimeoutError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// `i32` representing the number of nodes having acknowledged the request.
    pub received: CInt,
    /// `i32` representing the number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    /// Describes the type of the write that timed out
    pub write_type: WriteType,
}

/// Timeout exception during a read request.
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Copy, Clone, Hash)]
pub struct ReadTimeoutError {
    /// Consistency level of query.
    pub cl: Consistency,
    /// `i32` representing the number of nodes having acknowledged the request.
    pub received: CInt,
    /// `i32` representing the number of replicas whose acknowledgement is required to achieve `cl`.
    pub block_for: CInt,
    data_present: u8,
}

impl ReadTimeoutError {
    pub fn new(cl: Consistency, received: CInt, block_for: CInt, data_present: bool) -> Self {
        ReadTimeoutError {
            cl,
            received,
            block_for,
            data_present: data_present as u8,
        }
    }

    /// Shows if a replica has responded to a query.
    #[inline]
    pub fn replica_has_responded(&self) -> bool {
        self.data_present != 0
    }
}

/// Describes the type of the write that failed.
/// [Read more...](https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec#L1118)
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Display)]
pub enum WriteType {
    /// The write was a non-batched non-counter write
    Simple,
    /// The write was a (logged) batch write.
    /// If this type is received, it means the batch log
    /// has been successfully written
    Batch,
    /// The write was an unlogged batch. No batch log write has been attempted.
    UnloggedBatch,
    /// The write was a counter write (batched or not)
    Counter,
    /// The failure occurred during the write to the batch log when a (logged) batch
    /// write was requested.
    BatchLog,
}

/// The query attempted to create a keyspace or a table that was already existing.
/// [Read more...](https://github.com/apache/cassandra/blob/trunk/doc/native_protocol_v4.spec#L1140)
#[derive(Debug, PartialEq, Ord, PartialOrd, Eq, Hash, Clone, Constructor)]
pub struct AlreadyExistsError {
    /// Represents either the keyspace that already exists,
    /// or the keyspace in which the table that already exists is.
    pub ks: String,
    /// Represents the name of the table that already exists.
    pub table: String,
}

/// Can be thrown while a prepared statement tries to be
/// executed if the provided prepared statement ID is not known by
/// this host.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Constructor)]
pub struct UnpreparedError {
    /// Unknown ID.
    pub id: PreparedId,
}
