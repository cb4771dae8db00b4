use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;
use thiserror::Error;

/// Consecutive successes required in `HalfOpen` before the breaker closes.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the wrapped operation was not invoked.
    #[error("circuit breaker is open")]
    Open,
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { successes: u32 },
}

/// Wraps the bulk plan-file download path. Opens after `max_failures`
/// consecutive failures, probes again after `reset_timeout`, and needs two
/// consecutive successes in the probe window to fully close.
#[derive(Debug)]
pub struct CircuitBreaker {
    max_failures: u32,
    reset_timeout: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            reset_timeout,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    pub fn state(&self) -> BreakerState {
        #[expect(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        match *state {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { since } if since.elapsed() < self.reset_timeout => BreakerState::Open,
            State::Open { .. } => BreakerState::HalfOpen,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Runs `op` unless the breaker is open. The state lock is never held
    /// across the await.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit() {
            return Err(BreakerError::Open);
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn admit(&self) -> bool {
        #[expect(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Closed { .. } | State::HalfOpen { .. } => true,
            State::Open { since } => {
                if since.elapsed() < self.reset_timeout {
                    false
                } else {
                    *state = State::HalfOpen { successes: 0 };
                    true
                }
            }
        }
    }

    fn record_success(&self) {
        #[expect(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Closed { .. } => *state = State::Closed { failures: 0 },
            State::HalfOpen { successes } => {
                let successes = successes + 1;
                if successes >= HALF_OPEN_SUCCESS_THRESHOLD {
                    *state = State::Closed { failures: 0 };
                } else {
                    *state = State::HalfOpen { successes };
                }
            }
            // A success can race the open window; leave the breaker open.
            State::Open { .. } => {}
        }
    }

    fn record_failure(&self) {
        #[expect(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.max_failures {
                    tracing::warn!(failures, "circuit breaker opened");
                    *state = State::Open {
                        since: Instant::now(),
                    };
                } else {
                    *state = State::Closed { failures };
                }
            }
            State::HalfOpen { .. } => {
                *state = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    async fn failing(counter: &AtomicUsize) -> Result<(), &'static str> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err("boom")
    }

    async fn succeeding(counter: &AtomicUsize) -> Result<(), &'static str> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[tokio::test]
    async fn opens_after_max_failures_and_short_circuits() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = breaker.call(|| failing(&calls)).await;
            assert!(matches!(result, Err(BreakerError::Inner(_))));
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // Before the reset timeout the wrapped fn must not run.
        let result = breaker.call(|| failing(&calls)).await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn half_open_needs_two_successes_to_close() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let calls = AtomicUsize::new(0);

        let _ = breaker.call(|| failing(&calls)).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        assert!(breaker.call(|| succeeding(&calls)).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        assert!(breaker.call(|| succeeding(&calls)).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        let calls = AtomicUsize::new(0);

        let _ = breaker.call(|| failing(&calls)).await;
        std::thread::sleep(Duration::from_millis(20));

        let result = breaker.call(|| failing(&calls)).await;
        assert!(matches!(result, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn closed_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        let _ = breaker.call(|| failing(&calls)).await;
        assert!(breaker.call(|| succeeding(&calls)).await.is_ok());
        let _ = breaker.call(|| failing(&calls)).await;
        // Streak was broken by the success, so one more failure is needed.
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
