use bytes::Bytes;
use derive_more::{Constructor, Display};

use crate::types::PreparedId;

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Display)]
pub enum SchemaChangeType {
    Created,
    Updated,
    Dropped,
}

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Hash, Display)]
pub enum SchemaChangeTarget {
    Keyspace,
    Table,
    Type,
    Function,
    Aggregate,
}

/// Schema change reported in response to a DDL statement.
#[derive(Debug, PartialEq, Eq, Clone, Constructor)]
pub struct SchemaChange {
    pub change_type: SchemaChangeType,
    pub target: SchemaChangeTarget,
    pub keyspace: String,
    /// Name of the changed object for anything other than keyspaces.
    pub name: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResResultBody {
    Void,
    /// Encoded rows, opaque to the driver core.
    Rows(Bytes),
    SetKeyspace(String),
    Prepared(PreparedId),
    SchemaChange(SchemaChange),
}

impl ResResultBody {
    #[inline]
    pub fn into_prepared_id(self) -> Option<PreparedId> {
        match self {
            ResResultBody::Prepared(id) => Some(id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_schema_change(&self) -> Option<&SchemaChange> {
        match self {
            ResResultBody::SchemaChange(change) => Some(change),
            _ => None,
        }
    }
}
