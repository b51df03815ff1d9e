//! Bounded retry with backoff.
//!
//! [`RetryPolicy`] runs an async operation until it succeeds, the attempt budget
//! is spent, or the operation fails with an error the caller does not consider
//! retryable. It is independent of the database code so any bounded-retry need
//! can reuse it. Scheduling and sleeping are delegated to `backon`.

use backon::{
    BackoffBuilder, ConstantBackoff, ConstantBuilder, ExponentialBackoff, ExponentialBuilder,
    Retryable,
};
use std::cell::Cell;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Fixed(Duration),
    /// `initial`, then doubling after every failed attempt, never above `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay after the `attempt`-th failure (1-based).
    fn base_delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The policy allows zero attempts, so the operation never ran.
    #[error("no attempt made: retry policy allows zero attempts")]
    NoAttempts,

    /// Every attempt failed; `last` is the error from the final one.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The operation failed with an error the predicate rejected.
    #[error("attempt {attempt} failed with a non-retryable error: {error}")]
    NotRetryable { attempt: u32, error: E },
}

/// Attempt budget plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
            jitter: false,
        }
    }

    /// `max_attempts` tries separated by a constant `delay`.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    /// `max_attempts` tries with doubling delays from `initial` up to `max`.
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self::new(max_attempts, Backoff::Exponential { initial, max })
    }

    /// Add a random extra delay, below the scheduled one, to every sleep.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay slept after the `attempt`-th failure, before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.base_delay(attempt)
    }

    /// Retry on every error.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, |_| true).await
    }

    /// Retry while `should_retry` accepts the error.
    ///
    /// `operation` receives the 1-based attempt number. Nothing runs after the
    /// first success, and no sleep follows the final attempt.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        if self.max_attempts == 0 {
            return Err(RetryError::NoAttempts);
        }

        let attempt = Cell::new(0u32);
        let max_attempts = self.max_attempts;
        let outcome = (|| {
            attempt.set(attempt.get() + 1);
            operation(attempt.get())
        })
        .retry(*self)
        .when(|error| should_retry(error))
        .notify(|error, delay| {
            warn!(
                attempt = attempt.get(),
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
        })
        .await;

        let attempts = attempt.get();
        match outcome {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempt = attempts, "Operation succeeded after retrying");
                }
                Ok(value)
            }
            Err(error) if !should_retry(&error) => Err(RetryError::NotRetryable {
                attempt: attempts,
                error,
            }),
            Err(last) => Err(RetryError::Exhausted { attempts, last }),
        }
    }
}

/// Delay iterator handed to `backon`, one sleep per retry.
pub enum RetryDelays {
    Fixed(ConstantBackoff),
    Exponential(ExponentialBackoff),
}

impl Iterator for RetryDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RetryDelays::Fixed(delays) => delays.next(),
            RetryDelays::Exponential(delays) => delays.next(),
        }
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = RetryDelays;

    fn build(self) -> Self::Backoff {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        match self.backoff {
            Backoff::Fixed(delay) => {
                let mut builder = ConstantBuilder::default()
                    .with_delay(delay)
                    .with_max_times(retries);
                if self.jitter {
                    builder = builder.with_jitter();
                }
                RetryDelays::Fixed(builder.build())
            }
            Backoff::Exponential { initial, max } => {
                let mut builder = ExponentialBuilder::default()
                    .with_min_delay(initial)
                    .with_max_delay(max)
                    .with_factor(2.0)
                    .with_max_times(retries);
                if self.jitter {
                    builder = builder.with_jitter();
                }
                RetryDelays::Exponential(builder.build())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(4), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_delay_capped() {
        let policy =
            RetryPolicy::exponential(10, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_schedule_matches_delay_for() {
        let policy =
            RetryPolicy::exponential(5, Duration::from_millis(100), Duration::from_millis(300));
        let delays: Vec<Duration> = policy.build().collect();
        // One sleep between each pair of attempts
        assert_eq!(delays.len(), 4);
        for (i, delay) in delays.iter().enumerate() {
            assert_eq!(*delay, policy.delay_for(i as u32 + 1));
        }
    }

    #[test]
    fn test_exponential_cap_holds_for_any_attempt() {
        let policy =
            RetryPolicy::exponential(64, Duration::from_millis(25), Duration::from_secs(2));
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let attempt = rng.gen_range(1..=u32::MAX);
            assert!(policy.delay_for(attempt) <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_jitter_only_lengthens_delays() {
        let delay = Duration::from_millis(200);
        let policy = RetryPolicy::fixed(50, delay).with_jitter(true);
        let delays: Vec<Duration> = policy.build().collect();
        assert_eq!(delays.len(), 49);
        for jittered in delays {
            assert!(jittered >= delay && jittered <= delay * 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_never_runs() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let policy = RetryPolicy::fixed(0, Duration::from_millis(10));
        let result = policy
            .run(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
            .await;
        assert!(matches!(result, Err(RetryError::NoAttempts)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(10, Duration::from_millis(100));
        let start = Instant::now();

        let result = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(format!("attempt {} refused", attempt))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_returns_last_error() {
        let policy = RetryPolicy::fixed(4, Duration::from_millis(50));
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run(|attempt| async move { Err(format!("failure {}", attempt)) })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, "failure 4");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        // No sleep after the final attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(150) && elapsed < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::fixed(5, Duration::from_millis(50));

        let result: Result<(), _> = policy
            .run_if(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("permanent".to_string()) }
                },
                |e: &String| e != "permanent",
            )
            .await;

        assert!(matches!(
            result,
            Err(RetryError::NotRetryable { attempt: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
