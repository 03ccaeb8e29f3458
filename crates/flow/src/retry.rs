//! Retry policy: explicit backoff decisions.
//!
//! The policy is a plain value passed into a generic executor — retry
//! behavior is visible at every call site instead of hidden in macros.
//! Jitter (±25% by default) desynchronizes concurrently-failing tasks so a
//! shared outage doesn't produce a synchronized thundering herd.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use listpilot_core::config::FlowConfig;
use listpilot_core::failure::FailureKind;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub cap: Duration,
    /// Jitter fraction: each delay is scaled by a uniform factor in
    /// [1 - jitter, 1 + jitter].
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            cap: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FlowConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_ms),
            factor: config.retry_factor,
            cap: Duration::from_millis(config.retry_cap_ms),
            jitter: config.retry_jitter.clamp(0.0, 1.0),
        }
    }

    /// Un-jittered exponential delay after the given 1-indexed attempt:
    /// base × factor^(attempt−1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.cap.as_secs_f64()))
    }

    /// The [min, max] window a jittered delay for this attempt falls into.
    pub fn jitter_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let base = self.backoff(attempt).as_secs_f64();
        (
            Duration::from_secs_f64(base * (1.0 - self.jitter)),
            Duration::from_secs_f64(base * (1.0 + self.jitter)),
        )
    }

    /// Sample a jittered delay for the given attempt.
    pub fn jittered(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt).as_secs_f64();
        if self.jitter <= 0.0 {
            return Duration::from_secs_f64(base);
        }
        let scale = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        Duration::from_secs_f64(base * scale)
    }
}

/// Run `op` under the policy, retrying only failures whose [`FailureKind`]
/// is retryable. Terminates with the last error once attempts are exhausted
/// — it never hangs indefinitely.
pub async fn run_retried<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    classify: C,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> FailureKind,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let kind = classify(&error);
                if !kind.is_retryable() || attempt >= policy.max_attempts {
                    return Err(error);
                }
                let delay = policy.jittered(attempt);
                debug!(attempt, kind = %kind, delay_ms = delay.as_millis() as u64, error = %error, "Transient failure — backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn backoff_caps_at_sixty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        assert_eq!(policy.backoff(30), Duration::from_secs(60));
    }

    #[test]
    fn jitter_bounds_are_quarter_wide() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.jitter_bounds(1),
            (Duration::from_millis(750), Duration::from_millis(1250))
        );
        assert_eq!(
            policy.jitter_bounds(2),
            (Duration::from_millis(1500), Duration::from_millis(2500))
        );
        assert_eq!(
            policy.jitter_bounds(3),
            (Duration::from_secs(3), Duration::from_secs(5))
        );
    }

    #[test]
    fn sampled_delays_stay_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=3 {
            let (min, max) = policy.jitter_bounds(attempt);
            for _ in 0..200 {
                let delay = policy.jittered(attempt);
                assert!(delay >= min, "attempt {attempt}: {delay:?} < {min:?}");
                assert!(delay <= max, "attempt {attempt}: {delay:?} > {max:?}");
            }
        }
    }

    #[derive(Debug)]
    struct TestError(FailureKind);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error ({})", self.0)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            cap: Duration::from_millis(8),
            jitter: 0.25,
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), TestError> = run_retried(
            &fast_policy(),
            |e: &TestError| e.0,
            |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(FailureKind::TransientAutomation)) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn structural_failures_do_not_retry() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), TestError> = run_retried(
            &fast_policy(),
            |e: &TestError| e.0,
            |_| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError(FailureKind::Structural)) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, TestError> = run_retried(
            &fast_policy(),
            |e: &TestError| e.0,
            |attempt| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(TestError(FailureKind::TransientInfra))
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
