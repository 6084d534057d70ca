//! Bounded exponential backoff for rate-limited backend calls.
//!
//! This is the only retry point in the pipeline. Passes and backends never retry on
//! their own; they hand their call to [`RetryExecutor::run`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the first retry; doubled after every retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation`, waiting out rate limits.
    ///
    /// Rate-limit failures are retried up to `max_retries` times with delays of
    /// `initial_delay_ms`, doubled each time. Exhaustion yields
    /// `RateLimitExhausted`; any other failure is returned untouched on first sight.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> PipelineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let mut retries = 0;
        let mut delay = Duration::from_millis(self.policy.initial_delay_ms);

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(
                        operation = label,
                        error = %e,
                        retry = retries,
                        max_retries = self.policy.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        operation = label,
                        attempts = retries + 1,
                        "giving up after repeated rate limiting"
                    );
                    return Err(PipelineError::rate_limit_exhausted(retries + 1, &e));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn rate_limited() -> PipelineError {
        PipelineError::rate_limited(429, "mock", "Too Many Requests")
    }

    #[tokio::test(start_paused = true)]
    async fn always_rate_limited_exhausts_with_doubling_delays() {
        let calls: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
        let executor = RetryExecutor::default();

        let result: PipelineResult<()> = executor
            .run("test", || {
                calls.lock().unwrap().push(Instant::now());
                async { Err(rate_limited()) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimitExhausted);
        assert_eq!(err.status, Some(429));

        let calls = calls.into_inner().unwrap();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<u128> = calls
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(gaps, vec![2000, 4000, 8000]);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_once_rate_limit_clears() {
        let attempts = Mutex::new(0u32);
        let executor = RetryExecutor::new(RetryPolicy {
            max_retries: 3,
            initial_delay_ms: 10,
        });

        let value = executor
            .run("test", || {
                let n = {
                    let mut a = attempts.lock().unwrap();
                    *a += 1;
                    *a
                };
                async move {
                    if n < 3 {
                        Err(rate_limited())
                    } else {
                        Ok("graded")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "graded");
        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        for err in [
            PipelineError::invalid_credential(401, "mock", "bad key"),
            PipelineError::malformed_output("no json"),
            PipelineError::unclassified("boom"),
        ] {
            let attempts = Mutex::new(0u32);
            let start = Instant::now();
            let result: PipelineResult<()> = RetryExecutor::default()
                .run("test", || {
                    *attempts.lock().unwrap() += 1;
                    let err = err.clone();
                    async move { Err(err) }
                })
                .await;

            assert_eq!(result.unwrap_err(), err);
            assert_eq!(*attempts.lock().unwrap(), 1);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_fails_on_first_rate_limit() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_retries: 0,
            initial_delay_ms: 2000,
        });
        let result: PipelineResult<()> = executor
            .run("test", || async { Err(rate_limited()) })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimitExhausted);
        assert!(err.message.contains("1 attempts"));
    }
}
