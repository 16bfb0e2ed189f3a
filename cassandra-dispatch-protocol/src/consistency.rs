#![warn(missing_docs)]
//! The module contains Rust representation of Cassandra consistency levels.
use crate::error;
use derive_more::Display;
use std::convert::{From, TryFrom};
use std::default::Default;
use std::str::FromStr;

/// `Consistency` is an enum which represents Cassandra's consistency levels. The driver core does
/// not interpret the level beyond locality checks; it is forwarded unmodified to the transport.
#[derive(Debug, PartialEq, Clone, Copy, Display, Ord, PartialOrd, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Consistency {
    /// Closest replica, as determined by the snitch. Writes only.
    Any,
    /// At least one replica node must acknowledge.
    #[default]
    One,
    /// At least two replica nodes must acknowledge.
    Two,
    /// At least three replica nodes must acknowledge.
    Three,
    /// A quorum of replica nodes must acknowledge.
    Quorum,
    /// All replica nodes for the partition must acknowledge.
    All,
    /// A quorum of replica nodes in the coordinator's data center must acknowledge.
    LocalQuorum,
    /// A quorum of replica nodes in every data center must acknowledge.
    EachQuorum,
    /// Linearizable consistency for lightweight transactions.
    Serial,
    /// Same as SERIAL but confined to the data center.
    LocalSerial,
    /// At least one replica node in the local data center must acknowledge.
    LocalOne,
}

impl FromStr for Consistency {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let consistency = match s {
            "Any" | "ANY" => Consistency::Any,
            "One" | "ONE" => Consistency::One,
            "Two" | "TWO" => Consistency::Two,
            "Three" | "THREE" => Consistency::Three,
            "Quorum" | "QUORUM" => Consistency::Quorum,
            "All" | "ALL" => Consistency::All,
            "LocalQuorum" | "LOCAL_QUORUM" => Consistency::LocalQuorum,
            "EachQuorum" | "EACH_QUORUM" => Consistency::EachQuorum,
            "Serial" | "SERIAL" => Consistency::Serial,
            "LocalSerial" | "LOCAL_SERIAL" => Consistency::LocalSerial,
            "LocalOne" | "LOCAL_ONE" => Consistency::LocalOne,
            _ => {
                return Err(error::Error::General(format!(
                    "Invalid consistency provided: {s}"
                )))
            }
        };

        Ok(consistency)
    }
}

impl TryFrom<i16> for Consistency {
    type Error = error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0x0000 => Ok(Consistency::Any),
            0x0001 => Ok(Consistency::One),
            0x0002 => Ok(Consistency::Two),
            0x0003 => Ok(Consistency::Three),
            0x0004 => Ok(Consistency::Quorum),
            0x0005 => Ok(Consistency::All),
            0x0006 => Ok(Consistency::LocalQuorum),
            0x0007 => Ok(Consistency::EachQuorum),
            0x0008 => Ok(Consistency::Serial),
            0x0009 => Ok(Consistency::LocalSerial),
            0x000A => Ok(Consistency::LocalOne),
            _ => Err(Self::Error::UnknownConsistency(value)),
        }
    }
}

impl From<Consistency> for i16 {
    fn from(value: Consistency) -> Self {
        match value {
            Consistency::Any => 0x0000,
            Consistency::One => 0x0001,
            Consistency::Two => 0x0002,
            Consistency::Three => 0x0003,
            Consistency::Quorum => 0x0004,
            Consistency::All => 0x0005,
            Consistency::LocalQuorum => 0x0006,
            Consistency::EachQuorum => 0x0007,
            Consistency::Serial => 0x0008,
            Consistency::LocalSerial => 0x0009,
            Consistency::LocalOne => 0x000A,
        }
    }
}

impl Consistency {
    /// Does this consistency require local dc.
    #[inline]
    pub fn is_dc_local(self) -> bool {
        matches!(
            self,
            Consistency::LocalOne | Consistency::LocalQuorum | Consistency::LocalSerial
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_wire_code_round_trip() {
        for code in 0..=10i16 {
            let consistency = Consistency::try_from(code).unwrap();
            assert_eq!(i16::from(consistency), code);
        }
    }

    #[test]
    fn test_consistency_from() {
        assert_eq!(Consistency::try_from(0).unwrap(), Consistency::Any);
        assert_eq!(Consistency::try_from(4).unwrap(), Consistency::Quorum);
        assert_eq!(Consistency::try_from(6).unwrap(), Consistency::LocalQuorum);
        assert_eq!(Consistency::try_from(10).unwrap(), Consistency::LocalOne);
        assert!(matches!(
            Consistency::try_from(11),
            Err(error::Error::UnknownConsistency(11))
        ));
    }

    #[test]
    fn test_consistency_from_str() {
        assert_eq!(
            "LOCAL_QUORUM".parse::<Consistency>().unwrap(),
            Consistency::LocalQuorum
        );
        assert_eq!("EachQuorum".parse::<Consistency>().unwrap(), Consistency::EachQuorum);
        assert!("Local".parse::<Consistency>().is_err());
    }

    #[test]
    fn test_is_dc_local() {
        assert!(Consistency::LocalOne.is_dc_local());
        assert!(Consistency::LocalSerial.is_dc_local());
        assert!(!Consistency::Quorum.is_dc_local());
        assert!(!Consistency::EachQuorum.is_dc_local());
    }
}
