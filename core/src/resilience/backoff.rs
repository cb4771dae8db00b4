use rand::Rng;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Retry schedule for calls against the remote data API.
///
/// The policy is plain data; the retry loop itself lives with the caller so
/// concurrent fetches for different characters never share backoff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Invariant: >= 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each retryable failure.
    pub base_delay: Duration,
    /// Cap on the exponential growth.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Base delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`. No jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// `delay_for` augmented with a uniformly random jitter in `[0, delay)`,
    /// so concurrent per-character retry loops decorrelate instead of
    /// hammering the API in lockstep.
    pub fn jittered_delay_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        let delay_ns = delay.as_nanos() as u64;
        if delay_ns == 0 {
            return delay;
        }
        let jitter = rand::rng().random_range(0..delay_ns);
        delay.saturating_add(Duration::from_nanos(jitter))
    }
}
