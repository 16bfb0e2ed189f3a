use bytes::Bytes;
use derive_more::Constructor;

use crate::consistency::Consistency;
use crate::types::PreparedId;

/// Simple, unprepared query.
#[derive(Debug, PartialEq, Eq, Clone, Constructor)]
pub struct BodyReqQuery {
    pub query: String,
    pub consistency: Consistency,
    /// Encoded bound values, opaque to the driver core.
    pub values: Bytes,
    pub keyspace: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Constructor)]
pub struct BodyReqPrepare {
    pub query: String,
    pub keyspace: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone, Constructor)]
pub struct BodyReqExecute {
    pub id: PreparedId,
    pub consistency: Consistency,
    pub values: Bytes,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RequestBody {
    Query(BodyReqQuery),
    Prepare(BodyReqPrepare),
    Execute(BodyReqExecute),
    /// Asks the node for the schema version it currently sees.
    SchemaVersion,
}

impl RequestBody {
    /// Consistency forwarded with this request, if any.
    pub fn consistency(&self) -> Option<Consistency> {
        match self {
            RequestBody::Query(body) => Some(body.consistency),
            RequestBody::Execute(body) => Some(body.consistency),
            RequestBody::Prepare(_) | RequestBody::SchemaVersion => None,
        }
    }
}
