//! Retry with exponential backoff and jitter.
//!
//! The retry state is an explicit [`Attempt`] value handed to each try, so an
//! operation can tell a first attempt from a retry (and reset what a failed
//! attempt left behind) without shared mutable state.

use crate::control::Control;
use crate::error::Interrupt;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Errors that know whether another attempt may succeed.
pub trait Transient {
    /// Whether the failure is transient (network hiccup, 5xx, timeout of a
    /// single request) and worth another attempt.
    fn is_transient(&self) -> bool;

    /// How long the server asked the caller to wait before retrying.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any delay.
    pub max_delay: Duration,
    /// Randomize delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Set the delay bounds.
    #[must_use]
    pub const fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delays between attempts; yields `max_attempts - 1` values.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder.build()
    }
}

/// One attempt of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Attempt bound of the policy.
    pub max_attempts: u32,
}

impl Attempt {
    /// Whether this is a retry rather than the first attempt.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.number > 1
    }

    /// Failed attempts before this one.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.number - 1
    }

    /// Whether no attempt follows this one.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.number >= self.max_attempts
    }
}

/// Successful outcome with the number of failed attempts before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// The value.
    pub value: T,
    /// Transient failures that were retried.
    pub retries: u32,
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// A non-transient error; no further attempts were made.
    Permanent {
        /// The error.
        error: E,
        /// Attempts made.
        attempts: u32,
    },
    /// Every attempt failed transiently.
    Exhausted {
        /// Error of the last attempt.
        last: E,
        /// Attempts made.
        attempts: u32,
    },
    /// Cancelled or timed out, between or during attempts.
    Interrupted {
        /// The interrupt.
        interrupt: Interrupt,
        /// Attempts started.
        attempts: u32,
    },
}

impl<E> RetryFailure<E> {
    /// Attempts made before giving up.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Interrupted { attempts, .. } => *attempts,
        }
    }
}

/// Run `operation` under `policy`, retrying transient failures.
///
/// `into_interrupt` lets the operation's own error report that it was
/// interrupted (for example a killed child process); such errors are never
/// retried. A [`Transient::retry_after`] hint lengthens the next delay, up to
/// `policy.max_delay`.
///
/// # Errors
/// Returns a [`RetryFailure`] describing why no attempt succeeded.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    control: &Control,
    into_interrupt: impl Fn(&E) -> Option<Interrupt>,
    mut operation: F,
) -> Result<Retried<T>, RetryFailure<E>>
where
    E: Transient + std::fmt::Display,
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = policy.delays();
    let mut number = 1;

    loop {
        if let Some(interrupt) = control.interrupted() {
            return Err(RetryFailure::Interrupted {
                interrupt,
                attempts: number - 1,
            });
        }

        let attempt = Attempt {
            number,
            max_attempts,
        };
        let error = match operation(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    retries: attempt.retries(),
                });
            }
            Err(error) => error,
        };

        if let Some(interrupt) = into_interrupt(&error) {
            return Err(RetryFailure::Interrupted {
                interrupt,
                attempts: number,
            });
        }
        if !error.is_transient() {
            debug!(attempt = number, error = %error, "permanent failure, not retrying");
            return Err(RetryFailure::Permanent {
                error,
                attempts: number,
            });
        }
        if attempt.is_last() {
            warn!(attempts = number, error = %error, "retries exhausted");
            return Err(RetryFailure::Exhausted {
                last: error,
                attempts: number,
            });
        }

        let backoff = delays.next().unwrap_or(policy.max_delay);
        let delay = error
            .retry_after()
            .map_or(backoff, |hint| hint.max(backoff).min(policy.max_delay));
        warn!(attempt = number, delay = ?delay, error = %error, "transient failure, retrying");
        if let Err(interrupt) = control.sleep(delay).await {
            return Err(RetryFailure::Interrupted {
                interrupt,
                attempts: number,
            });
        }
        number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Flaky,
        Fatal,
        Throttled(Duration),
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Transient for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, Self::Flaky | Self::Throttled(_))
        }

        fn retry_after(&self) -> Option<Duration> {
            match self {
                Self::Throttled(wait) => Some(*wait),
                _ => None,
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3).with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn test_delays_are_bounded() {
        let policy = RetryPolicy::new(4)
            .with_delays(Duration::from_millis(100), Duration::from_millis(300))
            .without_jitter();
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.len(), 3);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(300)));
        assert_eq!(delays[0], Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        for k in 0..3 {
            let calls = Arc::new(AtomicU32::new(0));
            let seen = calls.clone();
            let out = retry(&fast_policy(), &Control::new(), |_| None, |attempt| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    if attempt.number <= k {
                        Err(TestError::Flaky)
                    } else {
                        Ok(attempt.number)
                    }
                }
            })
            .await
            .unwrap();
            assert_eq!(out.retries, k);
            assert_eq!(out.value, k + 1);
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
        }
    }

    #[tokio::test]
    async fn test_exhausts_after_bound() {
        let out: Result<Retried<()>, _> = retry(&fast_policy(), &Control::new(), |_| None, |_| async {
            Err(TestError::Flaky)
        })
        .await;
        assert_eq!(
            out,
            Err(RetryFailure::Exhausted {
                last: TestError::Flaky,
                attempts: 3
            })
        );
    }

    #[tokio::test]
    async fn test_permanent_is_not_retried() {
        let out: Result<Retried<()>, _> = retry(&fast_policy(), &Control::new(), |_| None, |_| async {
            Err(TestError::Fatal)
        })
        .await;
        assert_matches!(out, Err(RetryFailure::Permanent { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_server_hint_lengthens_delay() {
        let policy = RetryPolicy::new(2)
            .with_delays(Duration::from_millis(1), Duration::from_millis(200))
            .without_jitter();
        let started = std::time::Instant::now();
        let out = retry(&policy, &Control::new(), |_| None, |attempt| async move {
            if attempt.is_retry() {
                Ok(())
            } else {
                Err(TestError::Throttled(Duration::from_millis(120)))
            }
        })
        .await
        .unwrap();
        assert_eq!(out.retries, 1);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_server_hint_is_capped_by_policy() {
        let policy = RetryPolicy::new(2)
            .with_delays(Duration::from_millis(1), Duration::from_millis(20))
            .without_jitter();
        let started = std::time::Instant::now();
        retry(&policy, &Control::new(), |_| None, |attempt| async move {
            if attempt.is_retry() {
                Ok(())
            } else {
                Err(TestError::Throttled(Duration::from_secs(3600)))
            }
        })
        .await
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_no_retry_after_cancellation() {
        let control = Control::new();
        let calls = AtomicU32::new(0);
        let out: Result<Retried<()>, _> = retry(&fast_policy(), &control, |_| None, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            control.cancel();
            async { Err(TestError::Flaky) }
        })
        .await;
        assert_matches!(
            out,
            Err(RetryFailure::Interrupted {
                interrupt: Interrupt::Cancelled,
                ..
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interrupt_reported_by_operation() {
        let out: Result<Retried<()>, _> = retry(
            &fast_policy(),
            &Control::new(),
            |e: &TestError| (e == &TestError::Flaky).then_some(Interrupt::TimedOut),
            |_| async { Err(TestError::Flaky) },
        )
        .await;
        assert_matches!(
            out,
            Err(RetryFailure::Interrupted {
                interrupt: Interrupt::TimedOut,
                attempts: 1
            })
        );
    }
}
