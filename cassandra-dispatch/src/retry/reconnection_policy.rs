use rand::{rng, Rng};
use std::iter;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// Delays between consecutive reconnection attempts to a down host. The first attempt happens
/// after the first delay. When the schedule runs out, the driver gives up on the host: it stays
/// `Down` until something else marks it up.
pub type ReconnectionSchedule = Box<dyn Iterator<Item = Duration> + Send + Sync>;

/// Creates reconnection schedules for hosts which went down.
pub trait ReconnectionPolicy: Send + Sync {
    /// Creates a new schedule for a host which has just been marked down. Each schedule drives a
    /// single reconnection loop.
    fn new_host_schedule(&self) -> ReconnectionSchedule;
}

/// Reconnects to a down host at a fixed interval, optionally giving up after a number of attempts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstantReconnectionPolicy {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl ConstantReconnectionPolicy {
    pub fn new(delay: Duration) -> Self {
        ConstantReconnectionPolicy {
            delay,
            max_attempts: None,
        }
    }

    /// Gives up on a host after given number of failed attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for ConstantReconnectionPolicy {
    fn default() -> Self {
        ConstantReconnectionPolicy::new(DEFAULT_BASE_DELAY)
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn new_host_schedule(&self) -> ReconnectionSchedule {
        let delays = iter::repeat(self.delay);
        match self.max_attempts {
            Some(max_attempts) => Box::new(delays.take(max_attempts)),
            None => Box::new(delays),
        }
    }
}

/// Leaves down hosts alone. They come back only through an external `up` notification.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NeverReconnectionPolicy;

impl ReconnectionPolicy for NeverReconnectionPolicy {
    fn new_host_schedule(&self) -> ReconnectionSchedule {
        Box::new(iter::empty())
    }
}

/// Doubles the delay between reconnection attempts to a down host, starting at `base_delay` and
/// capping at `max_delay`. Each delay is randomized by +/-15% but never leaves the
/// `[base_delay, max_delay]` range.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExponentialReconnectionPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialReconnectionPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        assert!(
            base_delay <= max_delay,
            "Base reconnection delay must not exceed the maximum delay!"
        );

        ExponentialReconnectionPolicy {
            base_delay,
            max_delay,
            max_attempts: None,
        }
    }

    /// Gives up on a host after given number of failed attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for ExponentialReconnectionPolicy {
    fn default() -> Self {
        ExponentialReconnectionPolicy::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn new_host_schedule(&self) -> ReconnectionSchedule {
        let base_delay = self.base_delay;
        let max_delay = self.max_delay;

        let delays = iter::successors(Some(base_delay), move |delay| {
            Some(delay.saturating_mul(2).min(max_delay))
        })
        .map(move |delay| jitter(delay).clamp(base_delay, max_delay));

        match self.max_attempts {
            Some(max_attempts) => Box::new(delays.take(max_attempts)),
            None => Box::new(delays),
        }
    }
}

fn jitter(delay: Duration) -> Duration {
    (delay / 100).saturating_mul(rng().random_range(85..116))
}
