use bytemuck::NoUninit;
use derive_more::Display;

/// The state of a host, as viewed from the driver.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, NoUninit)]
#[repr(u8)]
pub enum HostState {
    /// The driver has never tried to connect to the host, nor received any topology events about
    /// it. Such hosts are still eligible for query plans; the first successful request moves them
    /// to `Up`.
    Unknown,
    /// The driver has successfully talked to the host, or a reconnection attempt succeeded.
    Up,
    /// The driver lost connectivity to the host and is trying to reconnect. Down hosts never
    /// appear in query plans.
    Down,
}
