use bytes::Bytes;
use derive_more::{Constructor, Display};
use std::fmt;

pub type CInt = i32;
pub type CIntShort = i16;

/// Opaque partition key bytes used to resolve preferred replicas.
#[derive(Clone, PartialEq, Eq, Hash, Constructor, Default)]
pub struct RoutingKey(Bytes);

impl RoutingKey {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Vec<u8>> for RoutingKey {
    fn from(value: Vec<u8>) -> Self {
        RoutingKey(value.into())
    }
}

impl From<&'static [u8]> for RoutingKey {
    fn from(value: &'static [u8]) -> Self {
        RoutingKey(Bytes::from_static(value))
    }
}

impl fmt::Debug for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingKey({})", hex(&self.0))
    }
}

/// Identifier a single node returned for a prepared statement. Identifiers are only meaningful to
/// the node which produced them.
#[derive(Clone, PartialEq, Eq, Hash, Constructor, Display)]
#[display("{}", hex(_0))]
pub struct PreparedId(Bytes);

impl PreparedId {
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PreparedId {
    fn from(value: Vec<u8>) -> Self {
        PreparedId(value.into())
    }
}

impl fmt::Debug for PreparedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreparedId({})", hex(&self.0))
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
