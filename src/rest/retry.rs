//! When and how long to wait before sending a request again.

use std::time::Duration;

use rand::Rng;

use super::Outcome;

/// Retry behaviour of the client.
///
/// Rate limited requests are always retried once the limit resets; only the
/// caller's timeout or cancellation bounds them. Server errors and network
/// failures are retried at most `max_retries` times with capped exponential
/// backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed for server errors and network failures.
    pub max_retries: u32,
    /// Delay before the first retry of a failure.
    pub base_delay: Duration,
    /// Upper bound of the backoff, before the random offset.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// What to do after an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt succeeded.
    Done,
    /// Send again after the delay.
    Retry(Duration),
    /// Give up and surface the failure.
    Fail,
}

impl RetryPolicy {
    /// A policy that never retries server errors or network failures.
    pub fn none() -> RetryPolicy {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    /// Decide on an attempt's outcome, given how many server errors and
    /// network failures were already retried.
    pub fn decide(&self, outcome: &Outcome, transient_failures: u32) -> RetryDecision {
        match *outcome {
            Outcome::Success => RetryDecision::Done,
            Outcome::ClientError => RetryDecision::Fail,
            Outcome::RateLimited { retry_after, .. } => RetryDecision::Retry(retry_after),
            Outcome::ServerError | Outcome::NetworkFailure => {
                if transient_failures >= self.max_retries {
                    RetryDecision::Fail
                } else {
                    RetryDecision::Retry(self.backoff(transient_failures))
                }
            }
        }
    }

    /// `base_delay * 2^n` capped at `max_delay`, plus up to a quarter of
    /// `base_delay` at random so clients do not retry in lockstep.
    pub fn backoff(&self, n: u32) -> Duration {
        let delay = self
            .base_delay
            .checked_mul(2u32.saturating_pow(n))
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let jitter_ms = (self.base_delay.as_millis() / 4) as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };

        delay + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
        }
    }

    #[test]
    fn rate_limits_wait_exactly_retry_after() {
        let outcome = Outcome::RateLimited {
            retry_after: Duration::from_millis(1500),
            global: false,
        };

        // no cap, however many times it happened
        assert_eq!(
            policy().decide(&outcome, 100),
            RetryDecision::Retry(Duration::from_millis(1500))
        );
    }

    #[test]
    fn client_errors_are_final() {
        assert_eq!(policy().decide(&Outcome::ClientError, 0), RetryDecision::Fail);
        assert_eq!(policy().decide(&Outcome::Success, 0), RetryDecision::Done);
    }

    #[test]
    fn transient_failures_are_bounded() {
        let policy = policy();
        for n in 0..3 {
            assert!(matches!(
                policy.decide(&Outcome::ServerError, n),
                RetryDecision::Retry(_)
            ));
        }
        assert_eq!(policy.decide(&Outcome::ServerError, 3), RetryDecision::Fail);
        assert_eq!(policy.decide(&Outcome::NetworkFailure, 3), RetryDecision::Fail);
        assert_eq!(RetryPolicy::none().decide(&Outcome::NetworkFailure, 0), RetryDecision::Fail);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = policy();
        let jitter = Duration::from_millis(25);

        for (n, expected) in [(0, 100), (1, 200), (2, 300), (40, 300)] {
            let delay = policy.backoff(n);
            let expected = Duration::from_millis(expected);
            assert!(delay >= expected && delay <= expected + jitter, "{n}: {delay:?}");
        }
    }
}
