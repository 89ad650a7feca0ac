//! Sleep computation between dispatch cycles.

use std::time::Duration;

use rand::Rng;

/// Base poll interval plus a uniformly random extra delay in `[0, jitter)`.
///
/// Loops sharing one database use different jitter draws so their polls
/// drift apart instead of hitting storage together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    poll_interval: Duration,
    jitter: Duration,
}

impl PollSchedule {
    pub const fn new(poll_interval: Duration, jitter: Duration) -> Self {
        Self { poll_interval, jitter }
    }

    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub const fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Next sleep using the thread-local RNG.
    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Next sleep drawn from `rng`.
    pub fn next_delay_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let jitter_nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        if jitter_nanos == 0 {
            return self.poll_interval;
        }

        let extra = rng.gen_range(0..jitter_nanos);
        self.poll_interval.saturating_add(Duration::from_nanos(extra))
    }
}
