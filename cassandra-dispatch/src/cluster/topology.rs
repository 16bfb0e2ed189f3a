mod host;
mod host_distance;
mod host_state;

pub use self::host::Host;
pub use self::host_distance::HostDistance;
pub use self::host_state::HostState;
