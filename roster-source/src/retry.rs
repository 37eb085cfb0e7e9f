//! Bounded exponential backoff.
//!
//! One [`RetryPolicy`] value is shared by every call site that talks to the
//! source: page fetches and per-user profile fetches. Sleeping goes through the
//! [`Pause`] trait so tests can record delays instead of waiting for them.

use std::cell::RefCell;
use std::time::Duration;

/// Something that can block the current thread for a while.
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// [`Pause`] backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// [`Pause`] that records requested delays without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    calls: RefCell<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.borrow().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.calls.borrow_mut().push(duration);
    }
}

/// Retry with delay `base_delay × 2^attempt`, at most `max_attempts` calls.
///
/// Every retryable failure is followed by its backoff delay, including the
/// last one before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay that follows a retryable failure of the zero-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(31)))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Returns the last error in the latter cases.
    pub fn run<T, E, F, R>(&self, pause: &dyn Pause, is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) => {
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    if attempt >= attempts {
                        tracing::warn!(
                            "giving up after {attempt} attempts ({err}); backing off {delay:?}"
                        );
                        pause.pause(delay);
                        return Err(err);
                    }
                    tracing::warn!("attempt {attempt}/{attempts} failed ({err}); retrying in {delay:?}");
                    pause.pause(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Fail {
        Busy,
        Broken,
    }

    impl std::fmt::Display for Fail {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn busy(e: &Fail) -> bool {
        *e == Fail::Busy
    }

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn three_retryable_failures_sleep_one_two_four_then_give_up() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let pause = RecordingPause::new();
        let mut calls = 0;
        let result: Result<(), Fail> = policy.run(&pause, busy, |_| {
            calls += 1;
            Err(Fail::Busy)
        });
        assert_eq!(result, Err(Fail::Busy));
        assert_eq!(calls, 3);
        assert_eq!(
            pause.calls(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }

    #[test]
    fn success_after_retry_stops_sleeping() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let pause = RecordingPause::new();
        let result: Result<u32, Fail> = policy.run(&pause, busy, |attempt| {
            if attempt == 0 {
                Err(Fail::Busy)
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(1));
        assert_eq!(pause.calls(), vec![Duration::from_millis(10)]);
    }

    #[test]
    fn non_retryable_error_returns_immediately() {
        let policy = RetryPolicy::default();
        let pause = RecordingPause::new();
        let mut calls = 0;
        let result: Result<(), Fail> = policy.run(&pause, busy, |_| {
            calls += 1;
            Err(Fail::Broken)
        });
        assert_eq!(result, Err(Fail::Broken));
        assert_eq!(calls, 1);
        assert!(pause.calls().is_empty());
    }

    #[test]
    fn zero_attempts_still_calls_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay: Duration::ZERO,
        };
        let pause = RecordingPause::new();
        let mut calls = 0;
        let _: Result<(), Fail> = policy.run(&pause, busy, |_| {
            calls += 1;
            Err(Fail::Busy)
        });
        assert_eq!(calls, 1);
    }
}
